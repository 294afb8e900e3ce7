use std::sync::Arc;

use super::common::*;
use crate::workflows::marketplace::domain::{
    InvoiceId, InvoiceState, JobState, PageLimits, PageRequest,
};
use crate::workflows::marketplace::error::{ErrorKind, MarketplaceError, StateViolation};
use crate::workflows::marketplace::invoices::InvoiceService;
use crate::workflows::marketplace::memory::InMemoryMarketplace;
use crate::workflows::marketplace::repository::InvoiceRepository;

fn interfering_invoices(
    store: &InMemoryMarketplace,
    interference: Interference,
) -> InvoiceService<InterferingStore> {
    InvoiceService::new(
        Arc::new(InterferingStore::new(store.clone(), interference)),
        PageLimits::default(),
    )
}

#[test]
fn intervals_bill_full_blocks_then_the_remainder() {
    let (marketplace, _) = build_marketplace();
    let job = ongoing_job(&marketplace, terms(50, 25, 10));

    let values: Vec<_> = (0..3)
        .map(|_| {
            marketplace
                .invoices()
                .create_invoice(&job.id, &contractor_x(), None)
                .expect("invoice raised")
        })
        .map(|invoice| (invoice.interval_number, invoice.value))
        .collect();
    assert_eq!(values, vec![(1, 500), (2, 500), (3, 250)]);

    match marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), None)
    {
        Err(MarketplaceError::InvalidState(StateViolation::IntervalExceeded { max_intervals })) => {
            assert_eq!(max_intervals, 3)
        }
        other => panic!("expected interval exceeded, got {other:?}"),
    }
}

#[test]
fn adjustment_shifts_value_and_never_goes_negative() {
    let (marketplace, _) = build_marketplace();
    let job = ongoing_job(&marketplace, terms(50, 25, 10));

    let bonus = marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), Some(120))
        .expect("invoice raised");
    assert_eq!(bonus.value, 620);
    assert_eq!(bonus.state, InvoiceState::Waiting);

    let refund = marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), Some(-10_000))
        .expect("invoice raised");
    assert_eq!(refund.value, 0);
}

#[test]
fn invoices_need_an_ongoing_job_and_its_contractor() {
    let (marketplace, _) = build_marketplace();
    let waiting = post_job(&marketplace, terms(50, 25, 10));
    let ongoing = ongoing_job(&marketplace, terms(50, 25, 10));

    match marketplace
        .invoices()
        .create_invoice(&waiting.id, &contractor_x(), None)
    {
        Err(MarketplaceError::InvalidState(StateViolation::JobNotOngoing)) => {}
        other => panic!("expected job not ongoing, got {other:?}"),
    }

    for caller in [employer(), contractor_y()] {
        match marketplace
            .invoices()
            .create_invoice(&ongoing.id, &caller, None)
        {
            Err(MarketplaceError::Forbidden(_)) => {}
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    marketplace
        .jobs()
        .update_state(&ongoing.id, &employer(), JobState::Complete)
        .expect("job completes");
    match marketplace
        .invoices()
        .create_invoice(&ongoing.id, &contractor_x(), None)
    {
        Err(MarketplaceError::InvalidState(StateViolation::JobNotOngoing)) => {}
        other => panic!("expected job not ongoing, got {other:?}"),
    }
}

#[test]
fn contractor_settles_waiting_invoice_once() {
    let (marketplace, _) = build_marketplace();
    let job = ongoing_job(&marketplace, terms(50, 25, 10));
    let invoice = marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), None)
        .expect("invoice raised");

    match marketplace
        .invoices()
        .update_state(&invoice.id, &employer(), InvoiceState::Complete)
    {
        Err(MarketplaceError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }

    match marketplace
        .invoices()
        .update_state(&invoice.id, &contractor_x(), InvoiceState::Waiting)
    {
        Err(err) => assert_eq!(err.kind(), ErrorKind::InvalidTransition),
        other => panic!("expected invalid transition, got {other:?}"),
    }

    let settled = marketplace
        .invoices()
        .update_state(&invoice.id, &contractor_x(), InvoiceState::Complete)
        .expect("contractor settles");
    assert_eq!(settled.state, InvoiceState::Complete);

    match marketplace
        .invoices()
        .update_state(&invoice.id, &contractor_x(), InvoiceState::Complete)
    {
        Err(MarketplaceError::InvalidTransition { from, to, .. }) => {
            assert_eq!((from, to), ("complete", "complete"))
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn invoices_are_visible_to_job_parties_only() {
    let (marketplace, _) = build_marketplace();
    let job = ongoing_job(&marketplace, terms(50, 25, 10));
    let invoice = marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), None)
        .expect("invoice raised");

    for caller in [employer(), contractor_x()] {
        let fetched = marketplace
            .invoices()
            .get_invoice(&invoice.id, &caller)
            .expect("party can read");
        assert_eq!(fetched, invoice);
    }

    match marketplace.invoices().get_invoice(&invoice.id, &stranger()) {
        Err(MarketplaceError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }

    match marketplace
        .invoices()
        .list_by_job(&job.id, &stranger(), None, PageRequest::default())
    {
        Err(MarketplaceError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }

    match marketplace
        .invoices()
        .get_invoice(&InvoiceId("invoice-missing".to_string()), &employer())
    {
        Err(err) => assert_eq!(err.kind(), ErrorKind::NotFound),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn job_invoices_list_in_interval_order() {
    let (marketplace, _) = build_marketplace();
    let job = ongoing_job(&marketplace, terms(50, 25, 10));
    let first = marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), None)
        .expect("invoice raised");
    marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), None)
        .expect("invoice raised");
    marketplace
        .invoices()
        .update_state(&first.id, &contractor_x(), InvoiceState::Complete)
        .expect("settled");

    let all = marketplace
        .invoices()
        .list_by_job(&job.id, &employer(), None, PageRequest::default())
        .expect("list succeeds");
    let intervals: Vec<_> = all.iter().map(|invoice| invoice.interval_number).collect();
    assert_eq!(intervals, vec![1, 2]);

    let open = marketplace
        .invoices()
        .list_by_job(
            &job.id,
            &contractor_x(),
            Some(InvoiceState::Waiting),
            PageRequest::default(),
        )
        .expect("list succeeds");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].interval_number, 2);
}

#[test]
fn deleting_latest_invoice_frees_its_interval() {
    let (marketplace, store) = build_marketplace();
    let job = ongoing_job(&marketplace, terms(50, 25, 10));
    marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), None)
        .expect("invoice raised");
    let second = marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), Some(75))
        .expect("invoice raised");

    marketplace
        .invoices()
        .delete_invoice(&second.id, &contractor_x())
        .expect("delete succeeds");
    assert_eq!(store.fetch_invoice(&second.id).expect("fetch succeeds"), None);

    let reissued = marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), None)
        .expect("invoice raised");
    assert_eq!(reissued.interval_number, 2);
    assert_eq!(reissued.value, 500);
}

#[test]
fn only_latest_waiting_invoice_can_be_deleted_by_contractor() {
    let (marketplace, _) = build_marketplace();
    let job = ongoing_job(&marketplace, terms(50, 25, 10));
    let first = marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), None)
        .expect("invoice raised");
    let second = marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), None)
        .expect("invoice raised");

    match marketplace
        .invoices()
        .delete_invoice(&first.id, &contractor_x())
    {
        Err(MarketplaceError::InvalidState(StateViolation::InvoiceNotLatest)) => {}
        other => panic!("expected invoice not latest, got {other:?}"),
    }

    match marketplace.invoices().delete_invoice(&second.id, &employer()) {
        Err(MarketplaceError::Forbidden(_)) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }

    marketplace
        .invoices()
        .update_state(&second.id, &contractor_x(), InvoiceState::Complete)
        .expect("settled");
    match marketplace
        .invoices()
        .delete_invoice(&second.id, &contractor_x())
    {
        Err(MarketplaceError::InvalidState(StateViolation::InvoiceNotWaiting)) => {}
        other => panic!("expected invoice not waiting, got {other:?}"),
    }
}

#[test]
fn invoice_settled_mid_delete_is_kept() {
    let (marketplace, store) = build_marketplace();
    let job = ongoing_job(&marketplace, terms(50, 25, 10));
    let invoice = marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), None)
        .expect("invoice raised");

    let racing = interfering_invoices(&store, Interference::SettleAfterFetch);
    match racing.delete_invoice(&invoice.id, &contractor_x()) {
        Err(MarketplaceError::Conflict(_)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }

    let kept = store
        .fetch_invoice(&invoice.id)
        .expect("fetch succeeds")
        .expect("settled invoice survives");
    assert_eq!(kept.state, InvoiceState::Complete);
}

#[test]
fn invoice_superseded_mid_delete_is_kept() {
    let (marketplace, store) = build_marketplace();
    let job = ongoing_job(&marketplace, terms(50, 25, 10));
    let invoice = marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), None)
        .expect("invoice raised");

    let racing = interfering_invoices(&store, Interference::BillAfterLatestLookup);
    match racing.delete_invoice(&invoice.id, &contractor_x()) {
        Err(MarketplaceError::Conflict(_)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }

    let intervals: Vec<_> = store
        .list_invoices(&job.id, None, everything())
        .expect("list succeeds")
        .iter()
        .map(|invoice| invoice.interval_number)
        .collect();
    assert_eq!(intervals, vec![1, 2]);
}

#[test]
fn stale_interval_lookup_surfaces_as_conflict() {
    let (marketplace, store) = build_marketplace();
    let job = ongoing_job(&marketplace, terms(50, 25, 10));
    marketplace
        .invoices()
        .create_invoice(&job.id, &contractor_x(), None)
        .expect("invoice raised");

    let lagging = interfering_invoices(&store, Interference::StaleLatestInterval);
    match lagging.create_invoice(&job.id, &contractor_x(), None) {
        Err(MarketplaceError::Conflict(_)) => {}
        other => panic!("expected conflict, got {other:?}"),
    }

    let billed = store
        .list_invoices(&job.id, None, everything())
        .expect("list succeeds");
    assert_eq!(billed.len(), 1);
}

#[test]
fn full_engagement_from_posting_to_archive() {
    let (marketplace, store) = build_marketplace();
    let job = post_job(&marketplace, terms(40, 16, 8));
    let application = apply(&marketplace, &job, &contractor_x());
    marketplace
        .applications()
        .accept(&application.id, &employer())
        .expect("accept succeeds");

    let mut billed = 0;
    for _ in 0..2 {
        let invoice = marketplace
            .invoices()
            .create_invoice(&job.id, &contractor_x(), None)
            .expect("invoice raised");
        billed += invoice.value;
        marketplace
            .invoices()
            .update_state(&invoice.id, &contractor_x(), InvoiceState::Complete)
            .expect("settled");
    }
    assert_eq!(billed, 40 * 16);

    marketplace
        .jobs()
        .update_state(&job.id, &contractor_x(), JobState::Complete)
        .expect("job completes");
    let archived = marketplace
        .jobs()
        .update_state(&job.id, &employer(), JobState::Archived)
        .expect("job archives");

    assert_eq!(stored_job(&store, &job.id), archived);
    let settled = marketplace
        .invoices()
        .list_by_job(
            &job.id,
            &employer(),
            Some(InvoiceState::Complete),
            PageRequest::default(),
        )
        .expect("list succeeds");
    assert_eq!(settled.len(), 2);
}
