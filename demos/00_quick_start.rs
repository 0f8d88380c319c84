/// quick start - quote an EMI and schedule a loan
use emi_ledger_rs::{EmiType, EventStore, InMemoryRepository, LoanEngine, Money, Rate};
use emi_ledger_rs::{SafeTimeProvider, TimeSource, Uuid};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::System);
    let engine = LoanEngine::new(InMemoryRepository::new(), EventStore::new(), &time);

    // quote before committing to anything
    let preview = engine.preview_schedule(
        Money::from_major(12_000),
        Rate::from_percentage(12),
        12,
        EmiType::ReducingBalance,
    )?;
    println!("emi: {}  total interest: {}", preview.monthly_emi, preview.total_interest);

    // create and activate the loan
    let loan = engine
        .loan_builder()
        .borrower(Uuid::new_v4())
        .principal(Money::from_major(12_000))
        .rate(Rate::from_percentage(12))
        .term_months(12)
        .build()?;
    let aggregate = engine.generate_schedule(loan)?;

    // pay the first installment
    let first = &aggregate.installments[0];
    engine.record_payment(first.id, first.total_due())?;

    println!("{}", engine.loan_summary(aggregate.id())?.to_json_pretty()?);

    Ok(())
}
