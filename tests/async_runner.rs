//! Promise-based transfers through the multi runner.

use http::Request;
use http_transfer::config::ClientConfig;
use http_transfer::error::TransferErrorKind;
use http_transfer::{Body, Client, PromiseState};

mod common;

fn get(url: String) -> Request<Body> {
    Request::get(url).body(Body::empty()).unwrap()
}

#[test]
fn test_two_requests_one_fails() {
    let backend = common::start_mock_backend();
    let mut client = Client::new(ClientConfig::default()).unwrap();

    let ok = client.send_async(get(backend.url("/a"))).unwrap();
    let failing = client.send_async(get(common::refused_url())).unwrap();
    assert_eq!(client.in_flight(), 2);

    client.wait_all();
    assert_eq!(client.in_flight(), 0);
    assert_eq!(ok.state(), PromiseState::Fulfilled);
    assert_eq!(failing.state(), PromiseState::Rejected);

    let err = failing.wait().unwrap_err();
    assert_eq!(err.kind(), TransferErrorKind::Transport);
    let mut response = ok.wait().unwrap();
    assert_eq!(response.body_mut().text().unwrap(), "GET /a");
}

#[test]
fn test_concurrent_slow_requests() {
    let backend = common::start_mock_backend();
    let mut client = Client::new(ClientConfig::default()).unwrap();

    let promises: Vec<_> = (0..4)
        .map(|_| client.send_async(get(backend.url("/slow"))).unwrap())
        .collect();
    for promise in promises {
        let mut response = promise.wait().unwrap();
        assert_eq!(response.body_mut().text().unwrap(), "slow");
    }
    assert_eq!(backend.requests(), 4);
    assert_eq!(client.in_flight(), 0);
}

#[test]
fn test_wait_on_one_promise() {
    let backend = common::start_mock_backend();
    let mut client = Client::new(ClientConfig::default()).unwrap();

    let first = client.send_async(get(backend.url("/first"))).unwrap();
    let second = client
        .send_async(
            Request::post(backend.url("/second"))
                .body(Body::from("payload"))
                .unwrap(),
        )
        .unwrap();

    let mut response = second.wait().unwrap();
    assert_eq!(response.body_mut().text().unwrap(), "payload");
    let mut response = first.wait().unwrap();
    assert_eq!(response.body_mut().text().unwrap(), "GET /first");
}

#[test]
fn test_cancel_pending_transfer() {
    let backend = common::start_mock_backend();
    let mut client = Client::new(ClientConfig::default()).unwrap();

    let cancelled = client.send_async(get(backend.url("/slow"))).unwrap();
    let kept = client.send_async(get(backend.url("/kept"))).unwrap();

    assert!(cancelled.cancel());
    assert_eq!(cancelled.state(), PromiseState::Rejected);
    assert_eq!(client.in_flight(), 1);

    client.wait_all();
    assert_eq!(kept.state(), PromiseState::Fulfilled);
    let err = cancelled.wait().unwrap_err();
    assert_eq!(err.kind(), TransferErrorKind::Cancelled);
    assert_eq!(err.request().uri.path(), "/slow");
}

#[test]
fn test_promise_outlives_client() {
    let backend = common::start_mock_backend();
    let promise = {
        let mut client = Client::new(ClientConfig::default()).unwrap();
        client.send_async(get(backend.url("/slow"))).unwrap()
    };

    let mut response = promise.wait().unwrap();
    assert_eq!(response.body_mut().text().unwrap(), "slow");
}
