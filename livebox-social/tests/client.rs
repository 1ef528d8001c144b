//! Building the client from YAML configuration.

mod common;

use std::time::Duration;

use common::{profile, world_with};
use livebox::{Config, ConfigError, RollbackPolicy};
use livebox_social::NotificationPermission;
use livebox_social::profile::key;
use livebox_social::UserId;
use pretty_assertions::assert_eq;

const YAML: &str = "
profile:
  ttl: 10m
  max_entries: 500
feed:
  page_size: 5
  rollback: refetch
realtime:
  event_buffer: 16
";

#[tokio::test]
async fn yaml_policies_reach_the_resources() {
    let config = Config::from_yaml(YAML).unwrap();
    let world = world_with(config, NotificationPermission::Default);
    let client = &world.client;

    assert_eq!(client.profiles().policy().ttl, Duration::from_secs(600));
    assert_eq!(client.profiles().fetcher().backend().ttl(), Duration::from_secs(600));
    assert_eq!(client.profiles().fetcher().backend().label().as_str(), "profile");
    assert_eq!(client.feed().policy().rollback, RollbackPolicy::Refetch);
    assert_eq!(client.feed().policy().page_size, Some(5));
    assert_eq!(
        client.notifications().fetcher().backend().ttl(),
        Duration::from_secs(30)
    );

    world.directory.put(profile("ada", "Ada Lovelace", 1));
    let mut resource = client.profile();
    resource.mount(Some(key(&UserId::from("ada")))).await;
    assert!(resource.state().profile().is_some());
}

#[tokio::test]
async fn feed_page_size_limits_the_load() {
    let config = Config::from_yaml(YAML).unwrap();
    let world = world_with(config, NotificationPermission::Default);
    for n in 0..8 {
        world.posts.put(common::post(&format!("p{n}"), "ada", 0, 1));
    }

    let mut feed = world.client.activity_feed();
    feed.mount(Some(UserId::from("me"))).await;
    assert_eq!(feed.state().posts().len(), 5);
}

#[test]
fn invalid_values_are_rejected() {
    let error = Config::from_yaml("realtime:\n  event_buffer: 0\n").unwrap_err();
    assert!(matches!(error, ConfigError::Invalid(_)));

    let error = Config::from_yaml("profile:\n  ttl: soon\n").unwrap_err();
    assert!(matches!(error, ConfigError::Parse(_)));
}
