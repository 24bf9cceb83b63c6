//! Contract tests for `HttpBackend` against the mock backend.

mod common;

use client_lib::adapters::HttpBackend;
use common::{spawn_backend, ADA_TOKEN, BOB_TOKEN};
use social_feed_core::domain::{Credential, ImageFile, NewPost};
use social_feed_core::ports::{FeedBackend, PortError};
use std::time::Duration;

fn backend(api_url: &str) -> HttpBackend {
    HttpBackend::new(api_url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn login_unwraps_the_data_envelope() {
    let mock = spawn_backend().await;
    let session = backend(&mock.api_url)
        .login("bob@example.com", "hunter2")
        .await
        .unwrap();
    assert_eq!(session.credential.as_str(), BOB_TOKEN);
    assert_eq!(session.user.username, "bob");
    assert_eq!(session.user.email, "bob@example.com");
    assert_eq!(session.user.bio, None);
}

#[tokio::test]
async fn server_errors_keep_status_and_message() {
    let mock = spawn_backend().await;
    let err = backend(&mock.api_url)
        .login("bob@example.com", "nope")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PortError::Server {
            status: 401,
            message: Some("Invalid email or password".to_string())
        }
    );
    assert_eq!(err.user_message("Login failed"), "Invalid email or password");
}

#[tokio::test]
async fn posts_decode_string_and_numeric_ids() {
    let mock = spawn_backend().await;
    let credential = Credential::new(ADA_TOKEN);
    let posts = backend(&mock.api_url)
        .list_posts(Some(&credential))
        .await
        .unwrap();
    let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p-ada", "7"]);
    assert_eq!(posts[0].image_url.as_deref(), Some("/uploads/engine.png"));
    assert_eq!(posts[1].image_url, None);
    assert_eq!(posts[1].author.username, "bob");
}

#[tokio::test]
async fn user_filter_is_sent_as_a_query_parameter() {
    let mock = spawn_backend().await;
    let credential = Credential::new(ADA_TOKEN);
    let posts = backend(&mock.api_url)
        .list_posts_for_user(Some(&credential), "u2")
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].content, "Bob was here");
}

#[tokio::test]
async fn missing_profiles_are_not_found() {
    let mock = spawn_backend().await;
    let credential = Credential::new(ADA_TOKEN);
    let err = backend(&mock.api_url)
        .user_profile(Some(&credential), "ghost")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn requests_without_a_credential_send_no_header() {
    let mock = spawn_backend().await;
    let err = backend(&mock.api_url).list_posts(None).await.unwrap_err();
    assert!(matches!(err, PortError::Server { status: 401, .. }));
    assert_eq!(mock.state.requests()[0].authorization, None);
}

#[tokio::test]
async fn create_post_sends_a_multipart_form() {
    let mock = spawn_backend().await;
    let credential = Credential::new(BOB_TOKEN);
    let post = NewPost {
        content: "Fresh bytes".to_string(),
        image: ImageFile::new("pixel.gif", "image/gif", &b"GIF89a"[..]),
    };
    let created = backend(&mock.api_url)
        .create_post(Some(&credential), &post)
        .await
        .unwrap();
    assert_eq!(created.content, "Fresh bytes");
    assert_eq!(created.author.id, "u2");

    let upload = &mock.state.uploads()[0];
    assert_eq!(upload.file_name.as_deref(), Some("pixel.gif"));
    assert_eq!(upload.content_type.as_deref(), Some("image/gif"));
    assert_eq!(upload.data.as_ref(), b"GIF89a");
}

#[tokio::test]
async fn delete_accepts_a_message_only_body() {
    let mock = spawn_backend().await;
    let credential = Credential::new(BOB_TOKEN);
    backend(&mock.api_url)
        .delete_post(Some(&credential), "7")
        .await
        .unwrap();
    assert_eq!(mock.state.post_ids(), vec!["p-ada".to_string()]);
}

#[tokio::test]
async fn unreachable_hosts_are_network_errors() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = backend(&format!("http://{}/api", addr))
        .list_posts(None)
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Network(_)));
}
