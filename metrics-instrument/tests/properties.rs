use metrics_instrument::{
    registry, with_local_sink, Instrumentation, InstrumentationError, Method, Target,
};
use metrics_instrument_util::CaptureSink;
use parking_lot::{const_mutex, Mutex, MutexGuard};
use proptest::{collection::vec as arb_vec, prelude::*};

static TEST_MUTEX: Mutex<()> = const_mutex(());

struct TestGuard {
    _test_mutex_guard: MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        registry().clear();
    }
}

fn setup() -> TestGuard {
    let guard = TestGuard { _test_mutex_guard: TEST_MUTEX.lock() };
    registry().clear();
    guard
}

#[derive(Debug)]
enum LedgerError {
    Rejected,
    Instrumentation,
}

impl From<InstrumentationError> for LedgerError {
    fn from(_: InstrumentationError) -> Self {
        LedgerError::Instrumentation
    }
}

struct Ledger;

/// Posts an amount: negative amounts are rejected, everything else is echoed back.
static POST: Method<Ledger, (i64,), i64, LedgerError> =
    Method::new(Target::of::<Ledger>, "post", |_, (amount,), _| {
        if *amount < 0 {
            Err(LedgerError::Rejected)
        } else {
            Ok(*amount)
        }
    });

fn post_all(amounts: &[i64]) -> CaptureSink {
    let sink = CaptureSink::new();
    with_local_sink(&sink, || {
        for amount in amounts {
            let _ = POST.call(&Ledger, &(*amount,));
        }
    });
    sink
}

fn successes(amounts: &[i64]) -> usize {
    amounts.iter().filter(|amount| **amount >= 0).count()
}

fn arb_amounts(max: usize) -> impl Strategy<Value = Vec<i64>> {
    arb_vec(-100i64..100, 0..max)
}

proptest! {
    #[test]
    fn count_emits_once_per_successful_call(amounts in arb_amounts(64)) {
        let _guard = setup();
        POST.count(Instrumentation::count("Ledger.post")).expect("valid instrumentation");

        let sink = post_all(&amounts);
        prop_assert_eq!(sink.increments("Ledger.post"), successes(&amounts));
        prop_assert_eq!(sink.len(), successes(&amounts));
    }

    #[test]
    fn count_if_matches_the_predicate(amounts in arb_amounts(64), threshold in 0i64..100) {
        let _guard = setup();
        let instrumentation = Instrumentation::count_if("Ledger.post.large")
            .with_predicate(move |amount: &i64| *amount >= threshold);
        POST.count_if(instrumentation).expect("valid instrumentation");

        let sink = post_all(&amounts);
        let expected = amounts.iter().filter(|amount| **amount >= threshold).count();
        prop_assert_eq!(sink.increments("Ledger.post.large"), expected);
    }

    #[test]
    fn count_success_emits_exactly_one_outcome_per_call(amounts in arb_amounts(64)) {
        let _guard = setup();
        let instrumentation = Instrumentation::count_success("Ledger.post");
        POST.count_success(instrumentation).expect("valid instrumentation");

        let sink = post_all(&amounts);
        let successes = successes(&amounts);
        prop_assert_eq!(sink.increments("Ledger.post.success"), successes);
        prop_assert_eq!(sink.increments("Ledger.post.failure"), amounts.len() - successes);
        prop_assert_eq!(sink.len(), amounts.len());
    }

    #[test]
    fn measure_records_every_call(amounts in arb_amounts(64), measure_on_error in any::<bool>()) {
        let _guard = setup();
        let instrumentation =
            Instrumentation::measure("Ledger.post").with_measure_on_error(measure_on_error);
        POST.measure(instrumentation).expect("valid instrumentation");

        let sink = post_all(&amounts);
        let expected = if measure_on_error { amounts.len() } else { successes(&amounts) };
        prop_assert_eq!(sink.measurements("Ledger.post").len(), expected);
    }

    #[test]
    fn stacking_preserves_the_returned_values(amounts in arb_amounts(32), depth in 0usize..6) {
        let _guard = setup();
        for level in 0..depth {
            let instrumentation = Instrumentation::count(format!("Ledger.post.{level}"));
            POST.count(instrumentation).expect("valid instrumentation");
        }
        prop_assert_eq!(POST.depth(), depth);

        let sink = CaptureSink::new();
        with_local_sink(&sink, || -> Result<(), TestCaseError> {
            for amount in &amounts {
                match POST.call(&Ledger, &(*amount,)) {
                    Ok(value) => prop_assert_eq!(value, *amount),
                    Err(LedgerError::Rejected) => prop_assert!(*amount < 0),
                    Err(LedgerError::Instrumentation) => {
                        prop_assert!(false, "static names never fail to resolve")
                    }
                }
            }
            Ok(())
        })?;
        prop_assert_eq!(sink.len(), depth * successes(&amounts));
    }
}
