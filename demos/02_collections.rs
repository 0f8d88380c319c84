/// collections - daily passes over a small portfolio and borrower risk
use chrono::{Duration, TimeZone, Utc};
use emi_ledger_rs::{
    EngineConfig, EventStore, InMemoryRepository, LoanEngine, Money, Rate, SafeTimeProvider,
    TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();
    let config = EngineConfig::from_json_str(r#"{ "collections": { "default_threshold_days": 60 } }"#)?;
    let engine = LoanEngine::with_config(InMemoryRepository::new(), EventStore::new(), &time, config)?;

    let borrower = Uuid::new_v4();
    for (amount, months) in [(5_000, 6), (20_000, 24), (80_000, 60)] {
        let loan = engine
            .loan_builder()
            .borrower(borrower)
            .principal(Money::from_major(amount))
            .rate(Rate::from_percentage(14))
            .term_months(months)
            .build()?;
        engine.generate_schedule(loan)?;
    }
    println!("risk at origination: {:?}\n", engine.score_risk(borrower)?);

    // nobody pays; run the daily passes for a quarter
    for _ in 0..100 {
        controller.advance(Duration::days(1));
        engine.run_reminder_pass()?;
        engine.run_due_today_pass()?;
        engine.run_overdue_sweep()?;
        let defaults = engine.run_default_check()?;
        if defaults.loans_updated > 0 {
            println!("{}: {} loan(s) defaulted", engine.today(), defaults.loans_updated);
        }
    }

    let risk = engine.score_risk(borrower)?;
    println!("\nrisk after missed payments: {} ({})", risk.score, risk.level);
    println!("{}", risk.recommendation);
    println!("notifications sent: {}", engine.notifier().len());

    Ok(())
}
