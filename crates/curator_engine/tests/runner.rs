use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use curator_core::{BlockList, BlockListOrigin, ImagePolicy, RejectionKind, TitleSource};
use curator_engine::{
    BlockListProvider, FeedSource, JobConfig, PipelineRunner, RunError, TlsPolicy,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FixedWords(Vec<&'static str>);

#[async_trait::async_trait]
impl BlockListProvider for FixedWords {
    async fn current(&self) -> BlockList {
        BlockList::new(self.0.iter().copied(), BlockListOrigin::Remote)
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap()
}

fn rss_item(server: &MockServer, title: &str, image: &str) -> String {
    format!(
        "<item><title>{title}</title>\
         <description>{title}: texto suficiente para passar pela regra de tamanho.</description>\
         <link>https://news.example.com/{image}</link>\
         <pubDate>Thu, 14 Mar 2024 08:00:00 +0000</pubDate>\
         <enclosure url=\"{uri}/img/{image}\" type=\"image/jpeg\"/></item>",
        uri = server.uri()
    )
}

fn rss(items: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><rss version=\"2.0\"><channel>\
         <title>Fonte</title><link>https://news.example.com</link><description>Resumo</description>{}\
         </channel></rss>",
        items.concat()
    )
}

async fn mount(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

fn job(server: &MockServer, temp: &TempDir) -> JobConfig {
    let mut config = JobConfig::default();
    config.feeds = vec![FeedSource {
        url: format!("{}/feed.xml", server.uri()),
        title: TitleSource::Original,
        tls: TlsPolicy::Verify,
    }];
    config.curation.max_age_hours = Some(72);
    config.work_dir = temp.path().to_path_buf();
    config
}

fn runner(config: JobConfig, words: Vec<&'static str>) -> PipelineRunner {
    curator_logging::initialize_for_tests();
    PipelineRunner::new(config)
        .with_block_list_provider(Arc::new(FixedWords(words)))
        .with_clock(now)
}

#[tokio::test]
async fn blocked_item_is_left_out_and_images_are_numbered() {
    let server = MockServer::start().await;
    let body = rss(&[
        rss_item(&server, "Safra recorde", "a.jpg"),
        rss_item(&server, "Oferta spam imperdível", "b.jpg"),
        rss_item(&server, "Dólar em queda", "c.jpg"),
    ]);
    mount(&server, "/feed.xml", ResponseTemplate::new(200).set_body_raw(body, "application/rss+xml")).await;
    mount(&server, "/img/a.jpg", ResponseTemplate::new(200).set_body_raw(vec![1u8; 10], "image/jpeg")).await;
    mount(&server, "/img/c.jpg", ResponseTemplate::new(200).set_body_raw(vec![3u8; 10], "image/jpeg")).await;
    let temp = TempDir::new().unwrap();

    let report = runner(job(&server, &temp), vec!["spam"])
        .run(&CancellationToken::new())
        .await
        .expect("run succeeds");

    assert_eq!(report.summary.fetched, 3);
    assert_eq!(report.summary.accepted, 2);
    assert_eq!(report.summary.rejected_for(RejectionKind::BlockedWord), 1);
    assert_eq!(report.summary.images_downloaded, 2);
    assert_eq!(report.summary.images_failed, 0);

    let written = fs::read_to_string(temp.path().join("feed.xml")).unwrap();
    assert_eq!(written, report.xml);
    assert!(written.contains("<title>Safra recorde</title>"));
    assert!(written.contains("<title>Dólar em queda</title>"));
    assert!(!written.contains("spam"));
    assert!(written.contains("<linkfoto>images/0.jpg</linkfoto>"));
    assert!(written.contains("<linkfoto>images/1.jpg</linkfoto>"));
    assert_eq!(fs::read(temp.path().join("images/1.jpg")).unwrap(), vec![3u8; 10]);
}

#[tokio::test]
async fn failed_image_leaves_item_without_linkfoto() {
    let server = MockServer::start().await;
    let body = rss(&[rss_item(&server, "Chuva no sul", "missing.jpg")]);
    mount(&server, "/feed.xml", ResponseTemplate::new(200).set_body_raw(body, "application/rss+xml")).await;
    mount(&server, "/img/missing.jpg", ResponseTemplate::new(404)).await;
    let temp = TempDir::new().unwrap();

    let report = runner(job(&server, &temp), vec![])
        .run(&CancellationToken::new())
        .await
        .expect("run succeeds");

    assert_eq!(report.summary.accepted, 1);
    assert_eq!(report.summary.images_failed, 1);
    assert!(report.xml.contains("<title>Chuva no sul</title>"));
    assert!(!report.xml.contains("<linkfoto>"));
    assert!(temp.path().join("feed.xml").exists());
}

#[tokio::test]
async fn failed_image_falls_back_to_placeholder() {
    let server = MockServer::start().await;
    let body = rss(&[rss_item(&server, "Petróleo sobe", "missing.jpg")]);
    mount(&server, "/feed.xml", ResponseTemplate::new(200).set_body_raw(body, "application/rss+xml")).await;
    mount(&server, "/img/missing.jpg", ResponseTemplate::new(500)).await;
    let temp = TempDir::new().unwrap();
    let mut config = job(&server, &temp);
    config.curation.image_policy = ImagePolicy::Placeholder {
        path: "./assets/placeholder.png".into(),
    };

    let report = runner(config, vec![]).run(&CancellationToken::new()).await.unwrap();

    assert!(report
        .xml
        .contains("<linkfoto>./assets/placeholder.png</linkfoto>"));
}

#[tokio::test]
async fn malformed_feed_aborts_without_output() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/feed.xml",
        ResponseTemplate::new(200).set_body_raw("<rss><channel><item>", "application/rss+xml"),
    )
    .await;
    let temp = TempDir::new().unwrap();

    let err = runner(job(&server, &temp), vec![])
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Parse { .. }), "got {err:?}");
    assert!(!temp.path().join("feed.xml").exists());
}

#[tokio::test]
async fn unreachable_feed_aborts_without_output() {
    let server = MockServer::start().await;
    mount(&server, "/feed.xml", ResponseTemplate::new(503)).await;
    let temp = TempDir::new().unwrap();

    let err = runner(job(&server, &temp), vec![])
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Fetch { .. }), "got {err:?}");
    assert!(!temp.path().join("feed.xml").exists());
}

#[tokio::test]
async fn duplicates_across_feeds_are_suppressed() {
    let server = MockServer::start().await;
    let first = rss(&[rss_item(&server, "Mesma notícia", "a.jpg")]);
    let second = rss(&[
        rss_item(&server, "Mesma notícia", "b.jpg"),
        rss_item(&server, "Outra notícia", "c.jpg"),
    ]);
    mount(&server, "/feed.xml", ResponseTemplate::new(200).set_body_raw(first, "application/rss+xml")).await;
    mount(&server, "/second.xml", ResponseTemplate::new(200).set_body_raw(second, "application/rss+xml")).await;
    for name in ["a.jpg", "c.jpg"] {
        mount(&server, &format!("/img/{name}"), ResponseTemplate::new(200).set_body_raw(vec![0u8; 4], "image/jpeg")).await;
    }
    let temp = TempDir::new().unwrap();
    let mut config = job(&server, &temp);
    config.feeds.push(FeedSource {
        url: format!("{}/second.xml", server.uri()),
        title: TitleSource::Label("Economia".into()),
        tls: TlsPolicy::Verify,
    });

    let report = runner(config, vec![]).run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.summary.feeds, 2);
    assert_eq!(report.summary.accepted, 2);
    assert_eq!(report.summary.rejected_for(RejectionKind::Duplicate), 1);
    assert!(report.xml.contains("<title>Economia</title>"));
    assert!(report.xml.contains("<linkfoto>images/1.jpg</linkfoto>"));
}

#[tokio::test]
async fn cancelled_run_writes_nothing() {
    let server = MockServer::start().await;
    let body = rss(&[rss_item(&server, "Qualquer", "a.jpg")]);
    mount(&server, "/feed.xml", ResponseTemplate::new(200).set_body_raw(body, "application/rss+xml")).await;
    let temp = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = runner(job(&server, &temp), vec![]).run(&cancel).await.unwrap_err();

    assert!(matches!(err, RunError::Cancelled));
    assert!(!temp.path().join("feed.xml").exists());
}

/// Feed with two items: `a.jpg` answers at once, `b.jpg` takes ten seconds.
async fn one_slow_image(server: &MockServer) {
    let body = rss(&[
        rss_item(server, "Milho em alta", "a.jpg"),
        rss_item(server, "Café estável", "b.jpg"),
    ]);
    mount(server, "/feed.xml", ResponseTemplate::new(200).set_body_raw(body, "application/rss+xml")).await;
    mount(server, "/img/a.jpg", ResponseTemplate::new(200).set_body_raw(vec![1u8; 10], "image/jpeg")).await;
    mount(
        server,
        "/img/b.jpg",
        ResponseTemplate::new(200)
            .set_delay(Duration::from_secs(10))
            .set_body_raw(vec![2u8; 10], "image/jpeg"),
    )
    .await;
}

fn assert_only_first_image_linked(xml: &str) {
    assert!(xml.contains("<title>Milho em alta</title>"));
    assert!(xml.contains("<title>Café estável</title>"));
    assert!(xml.contains("<linkfoto>images/0.jpg</linkfoto>"));
    assert_eq!(xml.matches("<linkfoto>").count(), 1);
}

#[tokio::test]
async fn cancel_during_downloads_keeps_completed_images() {
    let server = MockServer::start().await;
    one_slow_image(&server).await;
    let temp = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let report = runner(job(&server, &temp), vec![])
        .run(&cancel)
        .await
        .expect("document still written");

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.summary.accepted, 2);
    assert_eq!(report.summary.images_downloaded, 1);
    assert_eq!(report.summary.images_failed, 1);
    assert_only_first_image_linked(&report.xml);
    assert_eq!(fs::read_to_string(temp.path().join("feed.xml")).unwrap(), report.xml);
    assert!(temp.path().join("images/0.jpg").exists());
    assert!(!temp.path().join("images/1.jpg").exists());
}

#[tokio::test]
async fn image_deadline_abandons_slow_downloads() {
    let server = MockServer::start().await;
    one_slow_image(&server).await;
    let temp = TempDir::new().unwrap();
    let mut config = job(&server, &temp);
    config.images.deadline_secs = Some(1);

    let started = Instant::now();
    let report = runner(config, vec![])
        .run(&CancellationToken::new())
        .await
        .expect("run succeeds");

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1), "finished after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "finished after {elapsed:?}");
    assert_eq!(report.summary.images_downloaded, 1);
    assert_eq!(report.summary.images_failed, 1);
    assert_only_first_image_linked(&report.xml);
    assert!(temp.path().join("feed.xml").exists());
}
