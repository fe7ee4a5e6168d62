use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use http::header::{AGE, CACHE_CONTROL, DATE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use tower::{service_fn, Layer, Service, ServiceExt};
use tower_http_client_cache::prelude::*;

fn get_request(headers: &[(&str, &str)]) -> Request<()> {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri("http://example.org/resource");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(()).expect("request")
}

fn origin_date() -> String {
    httpdate::fmt_http_date(SystemTime::now())
}

async fn body_text(response: Response<Full<bytes::Bytes>>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collected")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

#[tokio::test]
async fn stores_and_serves_cacheable_response() {
    let layer = CacheLayer::new_in_memory(128);
    let counter = Arc::new(AtomicUsize::new(0));

    let mut service = layer.layer(service_fn({
        let counter = counter.clone();
        move |_req: Request<()>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let response = Response::builder()
                    .status(StatusCode::OK)
                    .header(CACHE_CONTROL, "max-age=3600")
                    .header(DATE, origin_date())
                    .body(Full::from("testbody"))
                    .expect("response");
                Ok::<_, Infallible>(response)
            }
        }
    }));

    service.ready().await.expect("service ready");
    let first = service
        .call(get_request(&[]))
        .await
        .expect("first call succeeds");
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_text(first).await, "testbody");

    service.ready().await.expect("service ready");
    let second = service
        .call(get_request(&[]))
        .await
        .expect("second call succeeds");
    let age: u64 = second
        .headers()
        .get(AGE)
        .expect("Age header on cached response")
        .to_str()
        .expect("Age is ascii")
        .parse()
        .expect("Age is numeric");
    assert!(age < 5, "freshly cached entry should report a tiny age");
    assert_eq!(body_text(second).await, "testbody");

    assert_eq!(counter.load(Ordering::SeqCst), 1, "origin hit exactly once");
}

#[tokio::test]
async fn no_store_request_bypasses_and_never_caches() {
    let layer = CacheLayer::new_in_memory(128);
    let counter = Arc::new(AtomicUsize::new(0));

    let mut service = layer.layer(service_fn({
        let counter = counter.clone();
        move |_req: Request<()>| {
            let counter = counter.clone();
            async move {
                let value = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let response = Response::builder()
                    .status(StatusCode::OK)
                    .header(CACHE_CONTROL, "max-age=3600")
                    .header(DATE, origin_date())
                    .body(Full::from(value.to_string()))
                    .expect("response");
                Ok::<_, Infallible>(response)
            }
        }
    }));

    service.ready().await.expect("service ready");
    let seeded = service
        .call(get_request(&[]))
        .await
        .expect("seed call succeeds");
    assert_eq!(body_text(seeded).await, "1");

    // A valid entry exists, but a no-store request must go to the origin.
    service.ready().await.expect("service ready");
    let bypassed = service
        .call(get_request(&[("cache-control", "no-store")]))
        .await
        .expect("bypass call succeeds");
    assert_eq!(body_text(bypassed).await, "2");

    // And its response must not have replaced the cached entry.
    service.ready().await.expect("service ready");
    let cached = service
        .call(get_request(&[]))
        .await
        .expect("cached call succeeds");
    assert_eq!(body_text(cached).await, "1");

    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn post_requests_are_never_cached() {
    let layer = CacheLayer::new_in_memory(128);
    let counter = Arc::new(AtomicUsize::new(0));

    let mut service = layer.layer(service_fn({
        let counter = counter.clone();
        move |_req: Request<()>| {
            let counter = counter.clone();
            async move {
                let value = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let response = Response::builder()
                    .status(StatusCode::OK)
                    .header(CACHE_CONTROL, "max-age=3600")
                    .header(DATE, origin_date())
                    .body(Full::from(value.to_string()))
                    .expect("response");
                Ok::<_, Infallible>(response)
            }
        }
    }));

    for expected in ["1", "2"] {
        let request = Request::builder()
            .method(Method::POST)
            .uri("http://example.org/resource")
            .body(())
            .expect("request");
        service.ready().await.expect("service ready");
        let response = service.call(request).await.expect("call succeeds");
        assert_eq!(body_text(response).await, expected);
    }
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn shared_cache_refuses_authorized_response_without_s_maxage() {
    let counter = Arc::new(AtomicUsize::new(0));
    let layer = CacheLayer::builder(InMemoryResponseCache::new(128, 1024 * 1024))
        .shared(true)
        .build();

    let mut service = layer.layer(service_fn({
        let counter = counter.clone();
        move |_req: Request<()>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let response = Response::builder()
                    .status(StatusCode::OK)
                    .header(CACHE_CONTROL, "public, max-age=60")
                    .header(DATE, origin_date())
                    .body(Full::from("authorized"))
                    .expect("response");
                Ok::<_, Infallible>(response)
            }
        }
    }));

    for _ in 0..2 {
        service.ready().await.expect("service ready");
        let response = service
            .call(get_request(&[("authorization", "Bearer X")]))
            .await
            .expect("call succeeds");
        assert_eq!(body_text(response).await, "authorized");
    }
    assert_eq!(counter.load(Ordering::SeqCst), 2, "both calls reach origin");
}

#[tokio::test]
async fn shared_cache_stores_authorized_response_with_s_maxage() {
    let counter = Arc::new(AtomicUsize::new(0));
    let layer = CacheLayer::builder(InMemoryResponseCache::new(128, 1024 * 1024))
        .shared(true)
        .build();

    let mut service = layer.layer(service_fn({
        let counter = counter.clone();
        move |_req: Request<()>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let response = Response::builder()
                    .status(StatusCode::OK)
                    .header(CACHE_CONTROL, "public, s-maxage=60")
                    .header(DATE, origin_date())
                    .body(Full::from("authorized"))
                    .expect("response");
                Ok::<_, Infallible>(response)
            }
        }
    }));

    for _ in 0..2 {
        service.ready().await.expect("service ready");
        let response = service
            .call(get_request(&[("authorization", "Bearer X")]))
            .await
            .expect("call succeeds");
        assert_eq!(body_text(response).await, "authorized");
    }
    assert_eq!(counter.load(Ordering::SeqCst), 1, "second call is a hit");
}

#[tokio::test]
async fn oversized_body_passes_through_and_is_not_cached() {
    let layer = CacheLayer::builder(InMemoryResponseCache::new(128, 1024))
        .max_response_body_size(1024)
        .build();
    let counter = Arc::new(AtomicUsize::new(0));

    let mut service = layer.layer(service_fn({
        let counter = counter.clone();
        move |_req: Request<()>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                // 2000 actual bytes, no Content-Length declared: the policy
                // admits it, the capture bound rejects it.
                let response = Response::builder()
                    .status(StatusCode::OK)
                    .header(CACHE_CONTROL, "max-age=3600")
                    .header(DATE, origin_date())
                    .body(Full::from(vec![b'x'; 2000]))
                    .expect("response");
                Ok::<_, Infallible>(response)
            }
        }
    }));

    service.ready().await.expect("service ready");
    let first = service
        .call(get_request(&[]))
        .await
        .expect("first call succeeds");
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_text(first).await.len(), 2000, "payload is intact");

    // The cache stayed empty for the key, so the origin is hit again.
    service.ready().await.expect("service ready");
    let second = service
        .call(get_request(&[]))
        .await
        .expect("second call succeeds");
    assert_eq!(body_text(second).await.len(), 2000);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn vary_responses_are_not_cached() {
    let layer = CacheLayer::new_in_memory(128);
    let counter = Arc::new(AtomicUsize::new(0));

    let mut service = layer.layer(service_fn({
        let counter = counter.clone();
        move |_req: Request<()>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let response = Response::builder()
                    .status(StatusCode::OK)
                    .header(CACHE_CONTROL, "max-age=60")
                    .header(DATE, origin_date())
                    .header("vary", "Accept-Encoding")
                    .body(Full::from("negotiated"))
                    .expect("response");
                Ok::<_, Infallible>(response)
            }
        }
    }));

    for _ in 0..2 {
        service.ready().await.expect("service ready");
        let response = service
            .call(get_request(&[]))
            .await
            .expect("call succeeds");
        assert_eq!(body_text(response).await, "negotiated");
    }
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn evict_and_clear_drop_cached_entries() {
    let store = InMemoryResponseCache::new(128, 1024 * 1024);
    let layer = CacheLayer::new(store);
    let counter = Arc::new(AtomicUsize::new(0));

    let mut service = layer.clone().layer(service_fn({
        let counter = counter.clone();
        move |_req: Request<()>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let response = Response::builder()
                    .status(StatusCode::OK)
                    .header(CACHE_CONTROL, "max-age=3600")
                    .header(DATE, origin_date())
                    .body(Full::from("testbody"))
                    .expect("response");
                Ok::<_, Infallible>(response)
            }
        }
    }));

    service.ready().await.expect("service ready");
    service
        .call(get_request(&[]))
        .await
        .expect("seed call succeeds");
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    let (request_head, _body) = get_request(&[]).into_parts();
    layer
        .store()
        .evict(&request_head)
        .await
        .expect("evict succeeds");

    service.ready().await.expect("service ready");
    service
        .call(get_request(&[]))
        .await
        .expect("call after evict succeeds");
    assert_eq!(counter.load(Ordering::SeqCst), 2, "evicted entry re-fetched");

    layer.store().clear().await.expect("clear succeeds");

    service.ready().await.expect("service ready");
    service
        .call(get_request(&[]))
        .await
        .expect("call after clear succeeds");
    assert_eq!(counter.load(Ordering::SeqCst), 3, "cleared entry re-fetched");
}
