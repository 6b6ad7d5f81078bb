use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use weft::traversal::{Scope, Traversal, TraversalBuilder, TraversalState, Value};
use weft::{Result, WeftError};

const NUM_THREADS: usize = 8;
const INPUTS_PER_THREAD: usize = 50;

fn select_and_store() -> Result<Traversal> {
    TraversalBuilder::start()
        .select_one(Scope::Local, "n")
        .store("seen")
        .build()
}

fn input(n: usize) -> Value {
    Value::map([("n", Value::Int(n as i64))])
}

#[test]
fn original_and_clones_run_concurrently_without_sharing_state() -> Result<()> {
    let original = select_and_store()?;
    let clones: Vec<Traversal> = (1..NUM_THREADS).map(|_| original.clone()).collect();
    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];

    // Thread 0 runs the original itself; the rest run clones.
    let traversals = std::iter::once(original).chain(clones);
    for (thread_id, mut traversal) in traversals.enumerate() {
        let barrier_clone = Arc::clone(&barrier);

        let handle = thread::spawn(move || -> Result<(Vec<Value>, Value, Traversal)> {
            let first = thread_id * INPUTS_PER_THREAD;
            let inputs: Vec<Value> = (first..first + INPUTS_PER_THREAD).map(input).collect();

            barrier_clone.wait();

            let execution = traversal.execute_with(inputs)?;
            let side_effects = Arc::clone(execution.side_effects());
            let values = execution.collect_values()?;
            let seen = side_effects.get("seen").unwrap_or(Value::Null);
            Ok((values, seen, traversal))
        });

        handles.push(handle);
    }

    let mut finished = vec![];
    for (thread_id, handle) in handles.into_iter().enumerate() {
        let (values, seen, traversal) = handle.join().expect("worker panicked")?;
        let first = thread_id * INPUTS_PER_THREAD;
        let expected: Vec<Value> = (first..first + INPUTS_PER_THREAD)
            .map(|n| Value::Int(n as i64))
            .collect();
        assert_eq!(values, expected);
        assert_eq!(seen, Value::List(expected));
        assert_eq!(traversal.state(), TraversalState::Locked);
        finished.push(traversal);
    }

    let original = &finished[0];
    for clone in &finished[1..] {
        assert_eq!(clone, original);
        assert_eq!(clone.plan_hash(), original.plan_hash());
    }
    Ok(())
}

#[test]
fn reconfiguring_a_clone_leaves_the_original_untouched() -> Result<()> {
    let original = TraversalBuilder::start()
        .inject([Value::map([("age", Value::Int(30))])])
        .select_one(Scope::Local, "age")
        .build()?;
    let before = original.to_string();

    let mut clone = original.clone();
    assert_eq!(clone, original);
    clone.set_scope(1, Scope::Global)?;

    assert_ne!(clone, original);
    assert_eq!(original.to_string(), before);
    assert_eq!(original.requirements().len(), 1);
    Ok(())
}

#[test]
fn each_execution_gets_fresh_side_effects() -> Result<()> {
    let mut traversal = select_and_store()?;

    let first = traversal.execute_with([input(1)])?;
    let first_effects = Arc::clone(first.side_effects());
    first.collect_values()?;

    let second = traversal.execute_with([input(2)])?;
    let second_effects = Arc::clone(second.side_effects());
    second.collect_values()?;

    assert_eq!(first_effects.get("seen"), Some(Value::List(vec![Value::Int(1)])));
    assert_eq!(second_effects.get("seen"), Some(Value::List(vec![Value::Int(2)])));
    Ok(())
}

#[test]
fn bulk_inputs_are_stored_once_per_unit() -> Result<()> {
    let mut traversal = select_and_store()?;
    let execution = traversal.execute_with_bulk([(input(7), 3)])?;
    let side_effects = Arc::clone(execution.side_effects());
    assert!(execution.shape().bulk);
    execution.collect_values()?;
    assert_eq!(
        side_effects.get("seen"),
        Some(Value::List(vec![Value::Int(7); 3]))
    );
    Ok(())
}

#[test]
fn cancelled_execution_stops_with_one_error() -> Result<()> {
    let mut traversal = TraversalBuilder::start()
        .inject([1, 2, 3])
        .identity()
        .build()?;
    let cancel = Arc::new(AtomicBool::new(false));
    let mut execution = traversal.execute_with_cancel(Some(Arc::clone(&cancel)))?;

    let first = execution.next().expect("first result")?;
    assert_eq!(first.get(), &Value::Int(1));

    cancel.store(true, Ordering::SeqCst);
    assert_eq!(execution.next().map(|r| r.err()), Some(Some(WeftError::Cancelled)));
    assert!(execution.next().is_none());
    Ok(())
}

#[test]
fn unbounded_bulk_is_rejected_instead_of_expanded() -> Result<()> {
    let mut traversal = select_and_store()?;
    let execution = traversal.execute_with_bulk([(input(1), u64::MAX), (input(2), 2)])?;
    let side_effects = Arc::clone(execution.side_effects());
    let results: Vec<_> = execution.values().collect();

    assert_eq!(results.len(), 2);
    assert!(
        matches!(&results[0], Err(WeftError::Invalid(message)) if message.contains("bulk")),
        "{:?}",
        results[0]
    );
    assert_eq!(results[1], Ok(Value::Int(2)));
    assert_eq!(
        side_effects.get("seen"),
        Some(Value::List(vec![Value::Int(2); 2]))
    );
    Ok(())
}
