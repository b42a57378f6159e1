//! Shared helpers for HTTP tests.
//!
//! Requests are driven through the router with `tower::ServiceExt::oneshot`,
//! so no port is bound.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use http_body_util::BodyExt;
use photowall::http::{self, AppState};
use photowall::shutdown::Shutdown;
use photowall::wall::{PhotoWall, WallConfig};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt;

/// A wall plus its router.
pub struct TestWall {
    pub wall: PhotoWall,
    pub shutdown: Shutdown,
    pub router: Router,
    /// Directory holding the wall's files.
    pub root: PathBuf,
    _dir: Option<TempDir>,
}

pub struct TestWallBuilder {
    max_photos: usize,
    max_concurrent_uploads: usize,
    max_image_bytes: usize,
    persistent: bool,
}

impl TestWall {
    pub fn builder() -> TestWallBuilder {
        TestWallBuilder {
            max_photos: 100,
            max_concurrent_uploads: 8,
            max_image_bytes: 3 * 1024 * 1024,
            persistent: false,
        }
    }

    /// Opens a wall with an explicit config. The caller owns its directories.
    pub async fn with_config(config: WallConfig) -> anyhow::Result<TestWall> {
        let root = config.uploads_dir.clone();
        let wall = PhotoWall::open(config).await?;
        let shutdown = Shutdown::new(wall.clone());
        let router = http::router(AppState::new(wall.clone(), shutdown.clone()));
        Ok(TestWall {
            wall,
            shutdown,
            router,
            root,
            _dir: None,
        })
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, value: &serde_json::Value) -> Response<Body> {
        self.post_raw(uri, serde_json::to_vec(value).unwrap()).await
    }

    pub async fn post_raw(&self, uri: &str, body: Vec<u8>) -> Response<Body> {
        let request = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

impl TestWallBuilder {
    pub fn max_photos(mut self, max_photos: usize) -> Self {
        self.max_photos = max_photos;
        self
    }

    pub fn max_concurrent_uploads(mut self, limit: usize) -> Self {
        self.max_concurrent_uploads = limit;
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.max_image_bytes = bytes;
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub async fn start(self) -> anyhow::Result<TestWall> {
        let dir = TempDir::new()?;
        let base = if self.persistent {
            WallConfig::persistent(dir.path())
        } else {
            WallConfig::in_memory(dir.path().join("uploads"))
        };
        let config = WallConfig {
            max_photos: self.max_photos,
            max_concurrent_uploads: self.max_concurrent_uploads,
            max_image_bytes: self.max_image_bytes,
            ..base
        };

        let mut host = TestWall::with_config(config).await?;
        host.root = dir.path().to_path_buf();
        host._dir = Some(dir);
        Ok(host)
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

pub fn jpeg_data_url(len: usize) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(vec![0x5Au8; len]))
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}
