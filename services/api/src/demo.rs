use clap::Args;
use hireflow::error::AppError;
use hireflow::workflows::marketplace::{
    billing, ApplicationState, Invoice, InvoiceState, Job, JobState, MarketplaceError, NewJob,
    PageLimits, PageRequest, UserId,
};
use serde::Serialize;

use crate::infra::in_memory_marketplace;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Hourly rate offered by the employer.
    #[arg(long, default_value_t = 50)]
    pub(crate) rate: u64,
    /// Total billable hours.
    #[arg(long, default_value_t = 25)]
    pub(crate) duration: u32,
    /// Hours covered by each invoice.
    #[arg(long, default_value_t = 10)]
    pub(crate) interval: u32,
    /// Amount added to (or, when negative, removed from) the final invoice.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub(crate) adjustment: i64,
    /// Contractors competing for the job; the first one is hired.
    #[arg(long, default_value_t = 3)]
    pub(crate) applicants: u32,
    /// Print the outcome as JSON instead of a text summary.
    #[arg(long)]
    pub(crate) json: bool,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            rate: 50,
            duration: 25,
            interval: 10,
            adjustment: 0,
            applicants: 3,
            json: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct DemoOutcome {
    job: Job,
    hired: UserId,
    rejected: Vec<UserId>,
    invoices: Vec<Invoice>,
}

impl DemoOutcome {
    fn total_billed(&self) -> u64 {
        self.invoices.iter().map(|invoice| invoice.value).sum()
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let outcome = run_engagement(&args)?;
    if args.json {
        let rendered = serde_json::to_string_pretty(&outcome)
            .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
        println!("{rendered}");
    } else {
        render_outcome(&args, &outcome);
    }
    Ok(())
}

fn run_engagement(args: &DemoArgs) -> Result<DemoOutcome, MarketplaceError> {
    let marketplace = in_memory_marketplace(PageLimits::default());
    let employer = UserId("employer-demo".to_string());

    let job = marketplace.jobs().create_job(
        &employer,
        NewJob {
            rate: args.rate,
            duration: args.duration,
            invoice_interval: args.interval,
        },
    )?;

    let mut applications = Vec::new();
    for index in 1..=args.applicants.max(1) {
        let contractor = UserId(format!("contractor-{index:02}"));
        applications.push(marketplace.applications().apply(&job.id, &contractor)?);
    }

    let chosen = &applications[0];
    marketplace.applications().accept(&chosen.id, &employer)?;
    let hired = chosen.contractor_id.clone();
    let rejected = marketplace
        .applications()
        .list_by_job(
            &job.id,
            &employer,
            Some(ApplicationState::Rejected),
            PageRequest::new(i64::MAX, 0),
        )?
        .into_iter()
        .map(|application| application.contractor_id)
        .collect();

    let total_intervals = billing::max_intervals(args.duration, args.interval);
    let mut invoices = Vec::new();
    for interval in 1..=total_intervals {
        let adjustment = (interval == total_intervals).then_some(args.adjustment);
        let invoice = marketplace
            .invoices()
            .create_invoice(&job.id, &hired, adjustment)?;
        let settled = marketplace
            .invoices()
            .update_state(&invoice.id, &hired, InvoiceState::Complete)?;
        invoices.push(settled);
    }

    marketplace
        .jobs()
        .update_state(&job.id, &hired, JobState::Complete)?;
    let job = marketplace
        .jobs()
        .update_state(&job.id, &employer, JobState::Archived)?;

    Ok(DemoOutcome {
        job,
        hired,
        rejected,
        invoices,
    })
}

fn render_outcome(args: &DemoArgs, outcome: &DemoOutcome) {
    println!("Job marketplace demo");
    println!(
        "- job {} | rate {} | {} hours billed every {} hours",
        outcome.job.id, args.rate, args.duration, args.interval
    );
    println!(
        "- hired {} | {} other applicant(s) rejected",
        outcome.hired,
        outcome.rejected.len()
    );

    println!("\nInvoices");
    for invoice in &outcome.invoices {
        println!(
            "- #{} {} | value {} | {}",
            invoice.interval_number,
            invoice.id,
            invoice.value,
            invoice.state.label()
        );
    }

    println!(
        "\nTotal billed {} | job {}",
        outcome.total_billed(),
        outcome.job.state.label()
    );
}
