//! Shared setup for the router tests.

#![allow(dead_code)] // Not every test binary uses every helper

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use dbm_testing::{InMemoryStore, MockPrivManagerApi, test_clock};
use dbm_web::{AccountCipher, AppState, router};
use std::sync::Arc;

pub const OPERATOR: &str = "admin";

pub struct TestApp {
    pub server: TestServer,
    pub store: InMemoryStore,
    pub priv_manager: MockPrivManagerApi,
    pub cipher: AccountCipher,
}

pub fn operator_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-bk-username"),
        HeaderValue::from_static(OPERATOR),
    )
}

pub fn spawn(store: InMemoryStore, priv_manager: MockPrivManagerApi) -> TestApp {
    spawn_with(store, priv_manager, |state| state)
}

pub fn spawn_with(
    store: InMemoryStore,
    priv_manager: MockPrivManagerApi,
    configure: impl FnOnce(AppState) -> AppState,
) -> TestApp {
    let cipher = AccountCipher::new(&[7u8; 32]).unwrap();
    let state = AppState::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(priv_manager.clone()),
        cipher.clone(),
    )
    .with_clock(Arc::new(test_clock()))
    .with_nginx_proxy_port(8080);
    let state = configure(state);

    TestApp {
        server: TestServer::new(router(state)).unwrap(),
        store,
        priv_manager,
        cipher,
    }
}
