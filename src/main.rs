// Payout Ledger - Admin CLI
// Small operational tool: initialize the database, inspect a seller's
// balance buckets, drain the notification outbox, or run a demo flow.

use anyhow::{bail, Result};
use std::env;
use std::path::Path;

use payout_ledger::{
    entries_for_seller, format_money, get_seller_by_email, insert_seller, open, Actor,
    BalanceLedger, FinalizeDecision, FlatRateTaxCalculator, LedgerConfig, NoopNotificationSink,
    Outbox, PayoutDetails, PayoutMethodRegistry, PayoutSlot, Seller, TaxCategory,
    VerificationWorkflow, WithdrawalProcessor,
};

const DEFAULT_DB: &str = "payout-ledger.db";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    let db_path = args.get(2).map(String::as_str).unwrap_or(DEFAULT_DB);

    match command {
        "init" => run_init(db_path),
        "balance" => run_balance(db_path, args.get(3).map(String::as_str)),
        "audit" => run_audit(db_path, args.get(3).map(String::as_str)),
        "drain" => run_drain(db_path),
        "demo" => run_demo(db_path),
        _ => {
            println!("payout-ledger {}", payout_ledger::VERSION);
            println!();
            println!("Usage:");
            println!("  payout-ledger init    [db]              initialize the database");
            println!("  payout-ledger balance [db] <seller-id>  show balance buckets");
            println!("  payout-ledger audit   [db] <seller-id>  show audit trail");
            println!("  payout-ledger drain   [db]              deliver queued notifications");
            println!("  payout-ledger demo    [db]              run an end-to-end payout flow");
            Ok(())
        }
    }
}

fn run_init(db_path: &str) -> Result<()> {
    open(Path::new(db_path))?;
    println!("✓ Database initialized at {} (WAL mode)", db_path);
    Ok(())
}

fn run_balance(db_path: &str, seller_id: Option<&str>) -> Result<()> {
    let Some(seller_id) = seller_id else {
        bail!("usage: payout-ledger balance [db] <seller-id>");
    };
    let conn = open(Path::new(db_path))?;
    let breakdown = BalanceLedger::balance_breakdown(&conn, seller_id)?;

    println!("Balance breakdown for {}", seller_id);
    println!("  balance:      {}", format_money(breakdown.balance));
    println!("  locked:       {}", format_money(breakdown.locked_balance));
    println!("  pending:      {}", format_money(breakdown.pending_balance));
    println!("  withdrawable: {}", format_money(breakdown.withdrawable_balance));
    Ok(())
}

fn run_audit(db_path: &str, seller_id: Option<&str>) -> Result<()> {
    let Some(seller_id) = seller_id else {
        bail!("usage: payout-ledger audit [db] <seller-id>");
    };
    let conn = open(Path::new(db_path))?;
    let entries = entries_for_seller(&conn, seller_id)?;
    println!("{} audit entries for {}", entries.len(), seller_id);
    for entry in entries {
        println!(
            "  {} {} by {} ({} -> {})",
            entry.created_at.to_rfc3339(),
            entry.action,
            entry.actor,
            entry.before_status.as_deref().unwrap_or("-"),
            entry.after_status.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn run_drain(db_path: &str) -> Result<()> {
    let conn = open(Path::new(db_path))?;
    let delivered = Outbox::drain(&conn, &NoopNotificationSink)?;
    println!("✓ Delivered {} queued notifications", delivered);
    Ok(())
}

/// End-to-end walkthrough: onboard a seller, verify a bank account, credit
/// revenue, withdraw with withholding tax.
fn run_demo(db_path: &str) -> Result<()> {
    let mut conn = open(Path::new(db_path))?;
    let config = LedgerConfig::default();
    let admin = Actor::admin("demo-admin");

    println!("🏪 Onboarding seller...");
    let seller = match get_seller_by_email(&conn, "ama@example.com") {
        Ok(existing) => existing,
        Err(_) => {
            let seller = Seller::new("Ama Mensah", "Ama's Fabrics", "ama@example.com", TaxCategory::Standard);
            insert_seller(&conn, &seller)?;
            seller
        }
    };
    println!("✓ Seller {} ({})", seller.name, seller.id);

    println!("\n🏦 Registering bank payout method...");
    let registry = PayoutMethodRegistry::new(config.clone());
    let details = PayoutDetails::bank("Ama Mensah", "0011223344", "GCB Bank");
    match registry.create(&mut conn, &seller.id, details, &Actor::seller(&seller.id)) {
        Ok(method) => println!("✓ Method created ({})", method.status.as_str()),
        Err(e) => println!("  (skipped: {})", e),
    }

    println!("\n✅ Admin approves the destination...");
    let outcome = VerificationWorkflow::approve(&mut conn, &seller.id, PayoutSlot::Bank, &admin)?;
    println!("✓ Bank slot verified (applied: {})", outcome.applied);

    println!("\n💰 Crediting GHS 1,000.00 of settled orders...");
    let b = BalanceLedger::credit_sale(&mut conn, &seller.id, 100_000, "demo orders")?;
    println!("✓ Withdrawable: {}", format_money(b.withdrawable_balance));

    println!("\n📤 Requesting a GHS 400.00 withdrawal...");
    let processor = WithdrawalProcessor::new(config, FlatRateTaxCalculator::default());
    let request = processor.create(&mut conn, &seller.id, 40_000, None)?;
    println!(
        "✓ Reserved {} (tax {} at {}bp, net {})",
        format_money(request.amount_requested),
        format_money(request.withholding_tax),
        request.withholding_tax_rate_bp,
        format_money(request.amount_paid_to_seller),
    );

    println!("\n🏁 Admin pays it out...");
    let paid = processor.finalize(&mut conn, &request.id, FinalizeDecision::Approve, &admin)?;
    println!("✓ Request {} is {}", paid.id, paid.status.as_str());

    let b = BalanceLedger::balance_breakdown(&conn, &seller.id)?;
    println!("\nFinal buckets:");
    println!("  balance:      {}", format_money(b.balance));
    println!("  pending:      {}", format_money(b.pending_balance));
    println!("  withdrawable: {}", format_money(b.withdrawable_balance));

    let delivered = Outbox::drain(&conn, &NoopNotificationSink)?;
    println!("\n✓ Drained {} notifications from the outbox", delivered);
    Ok(())
}
