#![allow(dead_code)]

use async_trait::async_trait;
use pantry::{FaultPolicy, Operation, RecipeStore, StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

/// Serve `store` on an ephemeral local port for the rest of the test; returns the base URL.
pub async fn spawn_server(store: RecipeStore) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = pantry::server::serve(listener, store, std::future::pending()).await;
    });
    format!("http://{addr}")
}

/// A base URL nothing is listening on.
pub async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

/// Fails the first `failures` calls of `target`, then lets everything through.
#[derive(Debug)]
pub struct FailFirst {
    target: Operation,
    failures: usize,
    seen: AtomicUsize,
}

impl FailFirst {
    pub fn new(target: Operation, failures: usize) -> Self {
        Self { target, failures, seen: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl FaultPolicy for FailFirst {
    async fn inject(&self, op: Operation) -> Result<(), StoreError> {
        if op == self.target && self.seen.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(op.transient());
        }
        Ok(())
    }
}

/// Delays reads by a fixed amount; mutations run immediately.
#[derive(Debug)]
pub struct SlowReads(pub Duration);

#[async_trait]
impl FaultPolicy for SlowReads {
    async fn inject(&self, op: Operation) -> Result<(), StoreError> {
        if op.is_read() {
            tokio::time::sleep(self.0).await;
        }
        Ok(())
    }
}
