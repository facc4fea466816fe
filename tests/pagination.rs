mod common;

use common::{detail_page, page_url, results_page, test_config, FixtureSource};
use job_harvester::crawl::{Crawler, NewListingsSeen, StopReason, Termination};
use job_harvester::fetch::FetchError;
use job_harvester::model::Query;

fn query() -> Query {
    Query::new("data scientist", "tx")
}

#[tokio::test]
async fn stops_on_first_diverging_count() {
    let source = FixtureSource::default();
    // Pages 1..=3 report their own index, page 4 reports 7.
    for n in 1..=3 {
        source.page(&page_url(n), results_page(n, &format!("p{n}"), 5, "Today")).await;
    }
    source.page(&page_url(4), results_page(7, "p4", 5, "Today")).await;
    source.page(&page_url(5), results_page(5, "p5", 5, "Today")).await;

    let cfg = test_config("./data");
    let crawler = Crawler::from_config(&source, &cfg).unwrap();
    let outcome = crawler.run(query()).await;

    assert_eq!(outcome.pages_fetched, 4);
    assert_eq!(outcome.listings.len(), 20);
    assert_eq!(
        outcome.termination,
        Termination::Stopped(StopReason::CountDiverged {
            page_index: 4,
            reported: Some(7)
        })
    );
    let fetched = source.fetched().await;
    assert_eq!(fetched, (1..=4).map(page_url).collect::<Vec<_>>());
}

#[tokio::test]
async fn two_page_scenario_fetches_exactly_two_pages() {
    let source = FixtureSource::default();
    source.page(&page_url(1), results_page(1, "a", 10, "Today")).await;
    source.page(&page_url(2), results_page(3, "b", 7, "2 days ago")).await;

    let cfg = test_config("./data");
    let outcome = Crawler::from_config(&source, &cfg).unwrap().run(query()).await;

    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(outcome.listings.len(), 17);
    assert!(outcome.aborted().is_none());
}

#[tokio::test]
async fn page_cap_limits_a_converging_source() {
    let source = FixtureSource::default();
    for n in 1..=10 {
        source.page(&page_url(n), results_page(n, &format!("p{n}"), 2, "Today")).await;
    }

    let cfg = test_config("./data");
    let outcome = Crawler::from_config(&source, &cfg)
        .unwrap()
        .with_page_cap(3)
        .run(query())
        .await;

    assert_eq!(outcome.pages_fetched, 3);
    assert_eq!(outcome.listings.len(), 6);
    assert_eq!(outcome.termination, Termination::Stopped(StopReason::PageCap { cap: 3 }));
}

#[tokio::test]
async fn fetch_failure_aborts_but_keeps_partial_batch() {
    let source = FixtureSource::default();
    source.page(&page_url(1), results_page(1, "a", 4, "Today")).await;
    source.fail(&page_url(2), 503).await;

    let cfg = test_config("./data");
    let outcome = Crawler::from_config(&source, &cfg).unwrap().run(query()).await;

    assert_eq!(outcome.pages_fetched, 1);
    assert_eq!(outcome.listings.len(), 4);
    assert_eq!(
        outcome.termination,
        Termination::Aborted(FetchError::Status {
            url: page_url(2),
            status: 503
        })
    );
}

#[tokio::test]
async fn missing_page_indicator_stops_after_first_page() {
    let source = FixtureSource::default();
    let html = results_page(1, "a", 3, "Today").replace("searchCountPages", "somethingElse");
    source.page(&page_url(1), html).await;

    let cfg = test_config("./data");
    let outcome = Crawler::from_config(&source, &cfg).unwrap().run(query()).await;

    assert_eq!(outcome.pages_fetched, 1);
    assert_eq!(outcome.listings.len(), 3);
    assert_eq!(
        outcome.termination,
        Termination::Stopped(StopReason::CountDiverged {
            page_index: 1,
            reported: None
        })
    );
}

#[tokio::test]
async fn detail_pages_supply_descriptions() {
    let source = FixtureSource::default();
    source.page(&page_url(1), results_page(2, "a", 2, "Today")).await;
    source
        .page("https://jobs.example.com/rc/clk?jk=a0", detail_page("Python, SQL and statistics"))
        .await;
    source.fail("https://jobs.example.com/rc/clk?jk=a1", 500).await;

    let mut cfg = test_config("./data");
    cfg.crawl.fetch_descriptions = true;
    let outcome = Crawler::from_config(&source, &cfg).unwrap().run(query()).await;

    assert_eq!(outcome.pages_fetched, 1);
    assert_eq!(
        outcome.listings[0].job_description.as_deref(),
        Some("Python, SQL and statistics")
    );
    assert_eq!(outcome.listings[1].job_description, None);
    assert!(outcome.aborted().is_none());
}

#[tokio::test]
async fn new_listings_policy_stops_on_repeated_page() {
    let source = FixtureSource::default();
    // Reported counts are irrelevant here; page 3 repeats page 2.
    source.page(&page_url(1), results_page(1, "a", 3, "Today")).await;
    source.page(&page_url(2), results_page(2, "b", 3, "Today")).await;
    source.page(&page_url(3), results_page(3, "b", 3, "Today")).await;

    let cfg = test_config("./data");
    let outcome = Crawler::from_config(&source, &cfg)
        .unwrap()
        .with_policy(Box::new(NewListingsSeen))
        .run(query())
        .await;

    assert_eq!(outcome.pages_fetched, 3);
    assert_eq!(
        outcome.termination,
        Termination::Stopped(StopReason::NoNewListings { page_index: 3 })
    );
}

#[tokio::test]
async fn new_listings_policy_advances_past_a_stale_count() {
    let source = FixtureSource::default();
    // Every page claims to be page 1.
    source.page(&page_url(1), results_page(1, "a", 3, "Today")).await;
    source.page(&page_url(2), results_page(1, "b", 3, "Today")).await;
    source.page(&page_url(3), results_page(1, "c", 3, "Today")).await;
    source.page(&page_url(4), results_page(1, "c", 3, "Today")).await;

    let cfg = test_config("./data");
    let outcome = Crawler::from_config(&source, &cfg)
        .unwrap()
        .with_policy(Box::new(NewListingsSeen))
        .run(query())
        .await;

    assert_eq!(source.fetched().await, (1..=4).map(page_url).collect::<Vec<_>>());
    assert_eq!(outcome.pages_fetched, 4);
    assert_eq!(outcome.listings.len(), 12);
    assert_eq!(
        outcome.termination,
        Termination::Stopped(StopReason::NoNewListings { page_index: 4 })
    );
}
