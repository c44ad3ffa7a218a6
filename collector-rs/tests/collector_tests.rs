use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use collector::{
    CollectionOptions, Collector, FetchFailure, FetchStrategy, PageRequest, SkipReason, StrategyKind,
};
use complaint_types::{CancellationFlag, ComplaintStatus};

/// Serves canned pages; pages beyond the map come back with an empty listing
struct SiteStrategy {
    kind: StrategyKind,
    pages: BTreeMap<u32, String>,
    calls: AtomicU32,
    cancel_after: Option<(u32, CancellationFlag)>,
}

impl SiteStrategy {
    fn new(kind: StrategyKind, pages: BTreeMap<u32, String>) -> Self {
        Self {
            kind,
            pages,
            calls: AtomicU32::new(0),
            cancel_after: None,
        }
    }
}

#[async_trait]
impl FetchStrategy for SiteStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn fetch(&self, request: &PageRequest) -> Result<String, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((page, flag)) = &self.cancel_after {
            if request.page == *page {
                flag.cancel();
            }
        }
        Ok(self
            .pages
            .get(&request.page)
            .cloned()
            .unwrap_or_else(|| listing_page(&[])))
    }
}

struct AlwaysBlocked;

#[async_trait]
impl FetchStrategy for AlwaysBlocked {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Http
    }

    async fn fetch(&self, _request: &PageRequest) -> Result<String, FetchFailure> {
        Err(FetchFailure::Blocked("status 403".to_string()))
    }
}

fn listing(id: &str, title: &str, description: &str) -> String {
    serde_json::json!({
        "id": id,
        "title": title,
        "description": description,
        "created": "2024-05-10T08:30:00",
        "status": "ANSWERED",
        "url": format!("reclamacao_{}", id),
        "solved": false
    })
    .to_string()
}

fn listing_page(listings: &[String]) -> String {
    format!(
        r#"<html><body><script id="__NEXT_DATA__" type="application/json">{{"props":{{"pageProps":{{"complaints":{{"LAST":[{}]}}}}}}}}</script></body></html>"#,
        listings.join(",")
    )
}

/// Five pages with two complaints each
fn five_page_site() -> BTreeMap<u32, String> {
    (1..=5)
        .map(|page| {
            let items = vec![
                listing(&format!("p{}a", page), "Motor", "Carro parou na estrada"),
                listing(&format!("p{}b", page), "Peças", "Sem previsão de peças"),
            ];
            (page, listing_page(&items))
        })
        .collect()
}

fn options(ceiling: u32) -> CollectionOptions {
    CollectionOptions {
        base_url: "https://site.test/empresa/acme".to_string(),
        page_ceiling: ceiling,
        delay: Duration::ZERO,
        ..CollectionOptions::default()
    }
}

#[tokio::test]
async fn ceiling_limits_pages_processed() {
    let site = Arc::new(SiteStrategy::new(StrategyKind::Http, five_page_site()));
    let collector = Collector::from_strategies(site.clone(), None, options(2));

    let report = collector.collect(&CancellationFlag::new()).await;

    assert_eq!(site.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.last_page, 2);
    let ids: Vec<_> = report.complaints.iter().map(|c| c.complaint_id.as_str()).collect();
    assert_eq!(ids, vec!["COMPLAINT_p1a", "COMPLAINT_p1b", "COMPLAINT_p2a", "COMPLAINT_p2b"]);
    assert!(report.complete());
    assert!(!report.reached_end);
}

#[tokio::test]
async fn fallback_output_matches_secondary_only_run() {
    let secondary_only = Collector::from_strategies(
        Arc::new(SiteStrategy::new(StrategyKind::Browser, five_page_site())),
        None,
        options(3),
    );
    let with_fallback = Collector::from_strategies(
        Arc::new(AlwaysBlocked),
        Some(Arc::new(SiteStrategy::new(StrategyKind::Browser, five_page_site()))),
        options(3),
    );

    let expected = secondary_only.collect(&CancellationFlag::new()).await;
    let actual = with_fallback.collect(&CancellationFlag::new()).await;

    assert_eq!(actual.complaints, expected.complaints);
    assert_eq!(actual.fallback_pages, 3);
    assert_eq!(actual.attempts.len(), 6);
    assert!(actual.skipped_pages.is_empty());
}

#[tokio::test]
async fn failed_page_is_skipped_and_collection_continues() {
    struct FlakySecondPage(SiteStrategy);

    #[async_trait]
    impl FetchStrategy for FlakySecondPage {
        fn kind(&self) -> StrategyKind {
            StrategyKind::Http
        }

        async fn fetch(&self, request: &PageRequest) -> Result<String, FetchFailure> {
            if request.page == 2 {
                return Err(FetchFailure::Http(500));
            }
            self.0.fetch(request).await
        }
    }

    let collector = Collector::from_strategies(
        Arc::new(FlakySecondPage(SiteStrategy::new(StrategyKind::Http, five_page_site()))),
        None,
        options(3),
    );
    let report = collector.collect(&CancellationFlag::new()).await;

    assert_eq!(report.skipped_pages.len(), 1);
    assert_eq!(report.skipped_pages[0].page, 2);
    assert_eq!(report.skipped_pages[0].reason, SkipReason::Fetch(FetchFailure::Http(500)));
    assert_eq!(report.complaints.len(), 4);
    let sequences: Vec<_> = report.complaints.iter().map(|c| c.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn ids_stay_unique_when_listings_shift_between_pages() {
    let mut pages = BTreeMap::new();
    pages.insert(
        1,
        listing_page(&[listing("10", "A", "primeira"), listing("11", "B", "segunda")]),
    );
    // A new complaint pushed "11" onto page 2
    pages.insert(
        2,
        listing_page(&[listing("11", "B", "segunda"), listing("12", "C", "terceira")]),
    );

    let collector = Collector::from_strategies(
        Arc::new(SiteStrategy::new(StrategyKind::Http, pages)),
        None,
        options(2),
    );
    let report = collector.collect(&CancellationFlag::new()).await;

    let ids: HashSet<_> = report.complaints.iter().map(|c| c.complaint_id.clone()).collect();
    assert_eq!(ids.len(), report.complaints.len());
    assert_eq!(report.complaints.len(), 3);
    assert_eq!(report.duplicates_dropped, 1);
}

#[tokio::test]
async fn complaints_are_redacted_and_mapped() {
    let mut pages = BTreeMap::new();
    pages.insert(
        1,
        listing_page(&[
            listing("1", "Atendimento", "Fui atendido pela oficina<br>sem retorno"),
            listing("2", "Cadastro", "Meu nome é João da Silva, CPF 123.456.789-00"),
            listing("3", "Contato", "Escrevam para cliente@exemplo.com.br"),
        ]),
    );

    let collector = Collector::from_strategies(
        Arc::new(SiteStrategy::new(StrategyKind::Http, pages)),
        None,
        options(1),
    );
    let report = collector.collect(&CancellationFlag::new()).await;

    assert_eq!(report.complaints.len(), 3);

    let first = &report.complaints[0];
    assert_eq!(first.body, "Fui atendido pela oficina sem retorno");
    assert_eq!(first.status, ComplaintStatus::InProgress);
    assert_eq!(first.public_link, "https://site.test/empresa/acme/reclamacao_1");
    assert_eq!(first.opened_at, chrono::NaiveDate::from_ymd_opt(2024, 5, 10));

    let second = &report.complaints[1].body;
    assert!(second.contains("[NOME]"), "{}", second);
    assert!(second.contains("[CPF]"), "{}", second);
    assert!(!second.contains("123.456.789-00"));
    assert!(!second.contains("João"));

    assert!(report.complaints[2].body.contains("[EMAIL]"));
    assert!(!report.redactions.is_empty());
}

#[tokio::test]
async fn cancellation_stops_between_pages() {
    let flag = CancellationFlag::new();
    let mut site = SiteStrategy::new(StrategyKind::Http, five_page_site());
    site.cancel_after = Some((2, flag.clone()));

    let collector = Collector::from_strategies(Arc::new(site), None, options(5));
    let report = collector.collect(&flag).await;

    assert!(report.cancelled);
    assert!(!report.complete());
    assert_eq!(report.pages_fetched, 2);

    let partial = report.to_partial();
    assert_eq!(partial.status, "partial");
    assert_eq!(partial.pages_completed, 2);
    assert_eq!(partial.complaints.len(), 4);
}

#[tokio::test]
async fn empty_page_ends_the_run() {
    let mut pages = five_page_site();
    pages.insert(3, listing_page(&[]));

    let collector = Collector::from_strategies(
        Arc::new(SiteStrategy::new(StrategyKind::Http, pages)),
        None,
        options(5),
    );
    let report = collector.collect(&CancellationFlag::new()).await;

    assert!(report.reached_end);
    assert_eq!(report.last_page, 3);
    assert_eq!(report.complaints.len(), 4);
}
