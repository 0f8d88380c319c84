/// lifecycle - schedule, late payment, penalty and completion on a test clock
use chrono::{Duration, TimeZone, Utc};
use emi_ledger_rs::{
    EmiType, EventStore, InMemoryRepository, LoanEngine, LoanRepository, Money, Rate,
    SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== loan lifecycle ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();
    let engine = LoanEngine::new(InMemoryRepository::new(), EventStore::new(), &time);

    // 1. origination
    println!("1. schedule");
    println!("-----------");
    let loan = engine
        .loan_builder()
        .borrower(Uuid::new_v4())
        .principal(Money::from_major(6_000))
        .rate(Rate::from_percentage(12))
        .term_months(6)
        .emi_type(EmiType::ReducingBalance)
        .build()?;
    let aggregate = engine.generate_schedule(loan)?;
    let loan_id = aggregate.id();
    for installment in &aggregate.installments {
        println!(
            "  #{} {}  emi {}  principal {}  interest {}  outstanding {}",
            installment.sequence,
            installment.due_date,
            installment.emi_amount,
            installment.principal_component,
            installment.interest_component,
            installment.outstanding_principal,
        );
    }

    // 2. on-time payments
    println!("\n2. on-time payments");
    println!("-------------------");
    for index in 0..3 {
        controller.advance(Duration::days(31));
        let installments = engine.repository().load_installments(loan_id)?;
        let installment = &installments[index];
        let outcome = engine.record_payment(installment.id, installment.total_due())?;
        println!(
            "  {}: paid #{} -> remaining balance {}",
            engine.today(),
            installment.sequence,
            outcome.remaining_balance
        );
    }

    // 3. a late installment picks up a penalty
    println!("\n3. late payment");
    println!("---------------");
    controller.advance(Duration::days(45));
    let report = engine.run_overdue_sweep()?;
    println!("  {}: sweep updated {} loan(s)", engine.today(), report.loans_updated);
    let summary = engine.loan_summary(loan_id)?;
    println!("  penalties so far: {}", summary.total_penalties);

    // 4. settle everything that is left
    println!("\n4. settlement");
    println!("-------------");
    for installment in engine.repository().load_installments(loan_id)? {
        if installment.remaining_amount().is_positive() {
            engine.record_payment(installment.id, installment.remaining_amount())?;
        }
    }
    let summary = engine.loan_summary(loan_id)?;
    println!("  status: {}", summary.status);
    println!("  remaining balance: {}", summary.remaining_balance);

    println!("\nevents:");
    for event in engine.notifier().take_events() {
        println!("  {:?}", event);
    }

    Ok(())
}
