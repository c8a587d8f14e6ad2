//! End-to-end journal flows through the ingestion gateway
//!
//! trade ingest -> close -> stats -> pattern detection -> memory -> hub

use journal_server::{
    hub::{JournalEvent, Subscription},
    insight::CannedInsight,
    models::{CloseTradeRequest, Direction, Outcome, PageQuery, PatternType, TradeInput, TradeUpdateRequest},
    observability::metrics,
    store::InMemoryRepository,
    EventHub, GatewaySettings, IngestionGateway, MetricsCollector,
};
use rust_decimal::Decimal;
use std::sync::Arc;

fn gateway() -> IngestionGateway {
    IngestionGateway::new(
        Arc::new(InMemoryRepository::new()),
        EventHub::new(128),
        Arc::new(CannedInsight),
        MetricsCollector::new(),
        GatewaySettings::default(),
    )
}

fn open(id: &str, strategy: &str) -> TradeInput {
    TradeInput {
        id: Some(id.to_string()),
        pair: Some("BTCUSDT".to_string()),
        direction: Some(Direction::Long),
        entry_price: Some(Decimal::from(100)),
        strategy: Some(strategy.to_string()),
        ..Default::default()
    }
}

fn close_at(exit: i64) -> CloseTradeRequest {
    CloseTradeRequest {
        exit_price: Decimal::from(exit),
        outcome: None,
        pnl: None,
        pnl_percent: None,
        notes: None,
        checklist_grade: None,
    }
}

async fn open_and_close(gw: &IngestionGateway, id: &str, exit: i64) {
    gw.create_or_update_trade(open(id, "breakout")).await.unwrap();
    gw.close_trade(id, close_at(exit)).await.unwrap();
}

fn drain(sub: &mut Subscription) -> Vec<JournalEvent> {
    let mut events = Vec::new();
    while let Some(event) = sub.try_recv() {
        events.push(event);
    }
    events
}

fn streak_events(events: &[JournalEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, JournalEvent::LearningUpdate(l) if l.pattern_type == PatternType::ConsecutiveLosses))
        .count()
}

#[tokio::test]
async fn test_third_loss_reports_streak_and_win_resets_it() {
    let gw = gateway();
    let mut sub = gw.subscribe().await.unwrap();
    drain(&mut sub);

    open_and_close(&gw, "l1", 90).await;
    open_and_close(&gw, "l2", 95).await;
    assert_eq!(streak_events(&drain(&mut sub)), 0);

    open_and_close(&gw, "l3", 80).await;
    let events = drain(&mut sub);
    assert_eq!(streak_events(&events), 1);
    let streak = events
        .iter()
        .find_map(|e| match e {
            JournalEvent::LearningUpdate(l) if l.pattern_type == PatternType::ConsecutiveLosses => Some(l),
            _ => None,
        })
        .unwrap();
    assert_eq!(streak.trade_id.as_deref(), Some("l3"));

    open_and_close(&gw, "w1", 150).await;
    assert_eq!(streak_events(&drain(&mut sub)), 0);

    open_and_close(&gw, "l4", 90).await;
    assert_eq!(streak_events(&drain(&mut sub)), 0);

    let stored = gw.list_learning_events(100).await.unwrap();
    assert_eq!(
        stored
            .iter()
            .filter(|e| e.pattern_type == PatternType::ConsecutiveLosses)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_late_subscriber_gets_init_then_live_events() {
    let gw = gateway();
    open_and_close(&gw, "t1", 120).await;
    gw.create_or_update_trade(open("t2", "breakout")).await.unwrap();

    let mut early = gw.subscribe().await.unwrap();
    drain(&mut early);

    let mut late = gw.subscribe().await.unwrap();
    match late.try_recv() {
        Some(JournalEvent::Connected { subscriber_id }) => assert_eq!(subscriber_id, late.id()),
        other => panic!("expected connected, got {:?}", other),
    }
    match late.try_recv() {
        Some(JournalEvent::Init(snapshot)) => {
            assert_eq!(snapshot.stats.total_trades, 1);
            assert_eq!(snapshot.trades.len(), 2);
        }
        other => panic!("expected init, got {:?}", other),
    }
    assert!(late.try_recv().is_none());

    gw.close_trade("t2", close_at(90)).await.unwrap();
    let kinds: Vec<_> = drain(&mut late).iter().map(|e| e.kind()).collect();
    assert_eq!(&kinds[..2], &["trade_close", "stats_update"]);

    // a disconnecting viewer leaves the others untouched
    drop(late);
    assert_eq!(gw.hub().subscriber_count(), 1);
    gw.create_or_update_trade(open("t3", "breakout")).await.unwrap();
    let kinds: Vec<_> = drain(&mut early).iter().map(|e| e.kind()).collect();
    assert_eq!(kinds.last(), Some(&"trade_open"));
}

#[tokio::test]
async fn test_resubmitted_trade_is_idempotent() {
    let gw = gateway();
    let mut sub = gw.subscribe().await.unwrap();
    drain(&mut sub);

    let first = gw.create_or_update_trade(open("t1", "breakout")).await.unwrap();
    let again = gw.create_or_update_trade(open("t1", "breakout")).await.unwrap();
    assert_eq!(first, again);

    let kinds: Vec<_> = drain(&mut sub).iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec!["trade_open"]);
    assert_eq!(gw.list_open_trades().await.unwrap().len(), 1);
    assert_eq!(gw.metrics().get_counter(metrics::TRADES_INGESTED).await, 1);
}

#[tokio::test]
async fn test_closed_at_tracks_outcome() {
    let gw = gateway();
    let trade = gw.create_or_update_trade(open("t1", "breakout")).await.unwrap();
    assert_eq!(trade.outcome, Outcome::Open);
    assert!(trade.closed_at.is_none());

    let trade = gw.close_trade("t1", close_at(100)).await.unwrap();
    assert_eq!(trade.outcome, Outcome::Breakeven);
    assert!(trade.closed_at.is_some());

    let trade = gw
        .update_trade_fields(
            "t1",
            TradeUpdateRequest {
                outcome: Some(Outcome::Open),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(trade.outcome, Outcome::Open);
    assert!(trade.closed_at.is_none());
    assert!(trade.exit_price.is_none());

    let trade = gw
        .update_trade_fields(
            "t1",
            TradeUpdateRequest {
                exit_price: Some(Decimal::from(80)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(trade.outcome, Outcome::Loss);
    assert!(trade.closed_at.is_some());

    for trade in gw.list_trades(&Default::default()).await.unwrap() {
        assert_eq!(trade.outcome.is_closed(), trade.closed_at.is_some());
    }
}

#[tokio::test]
async fn test_breakeven_close_credits_memory() {
    let gw = gateway();
    let before = gw.get_memory().await.unwrap();

    gw.create_or_update_trade(open("t1", "fade")).await.unwrap();
    gw.close_trade("t1", close_at(100)).await.unwrap();

    let after = gw.get_memory().await.unwrap();
    assert!(after.current_xp > before.current_xp || after.level > before.level);
    assert!(after.updated_at >= before.updated_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_keep_one_record_per_id() {
    let gw = Arc::new(IngestionGateway::new(
        Arc::new(InMemoryRepository::new()),
        EventHub::new(4096),
        Arc::new(CannedInsight),
        MetricsCollector::new(),
        GatewaySettings::default(),
    ));
    let mut sub = gw.subscribe().await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..32i64 {
        let gw = gw.clone();
        tasks.push(tokio::spawn(async move {
            let id = format!("d{}", i);
            gw.create_or_update_trade(open(&id, "breakout")).await?;
            gw.close_trade(&id, close_at(90 + i)).await
        }));
    }
    // several writers racing on the same ids with the same payload
    for i in 0..4 {
        for _ in 0..8 {
            let gw = gw.clone();
            tasks.push(tokio::spawn(async move {
                let id = format!("s{}", i);
                gw.create_or_update_trade(open(&id, "fade")).await?;
                gw.close_trade(&id, close_at(110)).await
            }));
        }
    }
    for task in tasks {
        let trade = task.await.unwrap().unwrap();
        assert!(trade.outcome.is_closed());
    }

    let trades = gw
        .list_trades(&PageQuery {
            limit: 100,
            offset: 0,
        })
        .await
        .unwrap();
    assert_eq!(trades.len(), 36);
    let mut ids: Vec<_> = trades.iter().map(|t| t.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 36);
    for trade in &trades {
        assert_eq!(trade.closed_at.is_some(), trade.outcome.is_closed());
    }

    assert_eq!(gw.get_stats().await.unwrap().total_trades, 36);
    assert_eq!(gw.metrics().get_counter(metrics::TRADES_CLOSED).await, 36);

    let events = drain(&mut sub);
    assert_eq!(gw.hub().dropped_events(), 0);
    let totals: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            JournalEvent::StatsUpdate(stats) => Some(stats.total_trades),
            _ => None,
        })
        .collect();
    assert!(totals.windows(2).all(|w| w[0] <= w[1]), "totals went backwards: {:?}", totals);
    assert_eq!(totals.last(), Some(&36));
}
