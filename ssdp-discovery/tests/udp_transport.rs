use futures_util::StreamExt;
use serial_test::serial;
use ssdp_discovery::*;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

// Documentation-only addresses: never assigned to a local interface
fn unassignable() -> [Interface; 2] {
    [
        Interface::Address(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))),
        Interface::Address(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1))),
    ]
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
#[serial]
async fn unusable_interfaces_report_no_sockets() {
    let (service, events) = Builder::new().spawn_with_events();

    let n = service
        .discover(SearchRequest::new().with_interfaces(unassignable()))
        .await
        .unwrap();
    assert_eq!(n, 0);

    drop(service);
    let events = tokio::time::timeout(Duration::from_secs(5), events.collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(
        events,
        vec![
            DiscoveryEvent::Started,
            DiscoveryEvent::Finished {
                no_sockets_available: true
            }
        ]
    );
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
#[serial]
async fn loopback_session_opens_and_closes() {
    // Sending to the multicast group may be refused in a sandbox; all
    // that matters here is that the lifecycle completes either way.
    let (service, events) = Builder::new().spawn_with_events();

    let n = service
        .discover(
            SearchRequest::new()
                .with_duration(Duration::from_millis(200))
                .with_interfaces([Interface::Address(IpAddr::V4(Ipv4Addr::LOCALHOST))]),
        )
        .await
        .unwrap();
    assert!(n <= 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        service.status().await.unwrap(),
        Status {
            state: SessionState::Idle,
            open_sockets: 0
        }
    );

    drop(service);
    let events = tokio::time::timeout(Duration::from_secs(5), events.collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(events.first(), Some(&DiscoveryEvent::Started));
    assert_eq!(
        events.last(),
        Some(&DiscoveryEvent::Finished {
            no_sockets_available: n == 0
        })
    );
}
