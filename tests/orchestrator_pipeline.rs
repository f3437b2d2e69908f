mod common;

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::{StubMetadata, StubResult, build_pipeline, write_input};
use vbatch::{EventKind, HW_CAP_SIGNATURE, MarkerStore, PipelineEvent};

fn plain_metadata(_input: &std::path::Path) -> StubMetadata {
    StubMetadata::default()
}

#[test]
fn run_encodes_every_ready_file_exactly_once() {
    let pipeline = build_pipeline(
        &["a.mp4", "b.mov", "c.mp4", "d.mp4"],
        plain_metadata,
        |_| {},
        |_| {},
    );

    let outcome = pipeline.orchestrator.run(&pipeline.input).expect("run");
    assert!(!outcome.interrupted);

    assert_eq!(pipeline.encoder.launch_count(), 4);
    for name in ["a.mp4", "b.mov", "c.mp4", "d.mp4"] {
        assert_eq!(
            pipeline.encoder.launches_for(&pipeline.input_file(name)),
            1,
            "{name} must be launched exactly once"
        );
        assert!(pipeline.output_file(name).exists(), "{name} output missing");
    }

    let snapshot = pipeline.state.snapshot();
    assert_eq!(snapshot.completed, 4);
    assert_eq!(snapshot.failed + snapshot.hw_cap + snapshot.interrupted, 0);
}

#[test]
fn resume_skips_outputs_that_are_already_done() {
    let pipeline = build_pipeline(
        &["one.mp4", "two.mp4", "three.mp4"],
        plain_metadata,
        |_| {},
        |_| {},
    );
    // A final output newer than its source, with no markers: already done.
    thread::sleep(Duration::from_millis(20));
    fs::write(pipeline.output_file("one.mp4"), b"done earlier").unwrap();

    pipeline.orchestrator.run(&pipeline.input).expect("run");

    assert_eq!(pipeline.encoder.launch_count(), 2, "only two encoder runs");
    assert_eq!(
        pipeline.encoder.launches_for(&pipeline.input_file("one.mp4")),
        0
    );
    let snapshot = pipeline.state.snapshot();
    assert_eq!(snapshot.completed, 2);
    assert_eq!(snapshot.discovery.already_compressed, 1);
}

#[test]
fn second_run_over_same_tree_is_idempotent() {
    let pipeline = build_pipeline(&["x.mp4", "y.mp4"], plain_metadata, |_| {}, |_| {});
    pipeline.orchestrator.run(&pipeline.input).expect("first run");
    assert_eq!(pipeline.encoder.launch_count(), 2);

    // Outputs are newer than their sources now; a second pass over the same
    // tree performs zero encoder invocations.
    let pipeline = pipeline.rewire(plain_metadata, |_| {}, |_| {});
    let outcome = pipeline.orchestrator.run(&pipeline.input).expect("second run");
    assert!(!outcome.interrupted);
    assert_eq!(pipeline.encoder.launch_count(), 0);
    assert_eq!(pipeline.state.snapshot().discovery.already_compressed, 2);
}

#[test]
fn hw_cap_failure_is_remembered_across_runs() {
    let pipeline = build_pipeline(
        &["tenbit.mp4", "plain.mp4"],
        plain_metadata,
        |_| {},
        |_| {},
    );
    pipeline
        .encoder
        .results
        .lock()
        .unwrap()
        .insert(pipeline.input_file("tenbit.mp4"), StubResult::HwCap);

    pipeline.orchestrator.run(&pipeline.input).expect("run");

    let snapshot = pipeline.state.snapshot();
    assert_eq!(snapshot.hw_cap, 1);
    assert_eq!(snapshot.failed, 0, "hw-cap is not counted as failed");
    assert_eq!(snapshot.completed, 1);

    let err_path = MarkerStore::err_path(&pipeline.output_file("tenbit.mp4"));
    let content = fs::read_to_string(&err_path).expect(".err written");
    assert!(content.contains(HW_CAP_SIGNATURE));

    // Next run: classified err_hw at discovery, no encoder invocation.
    let pipeline = pipeline.rewire(plain_metadata, |_| {}, |_| {});
    pipeline.orchestrator.run(&pipeline.input).expect("re-run");
    assert_eq!(pipeline.encoder.launch_count(), 0);
    assert_eq!(pipeline.state.snapshot().discovery.ignored_hw_cap, 1);
}

#[test]
fn failed_jobs_write_err_markers_that_skip_future_runs() {
    let pipeline = build_pipeline(&["bad.mp4", "good.mp4"], plain_metadata, |_| {}, |_| {});
    pipeline
        .encoder
        .results
        .lock()
        .unwrap()
        .insert(pipeline.input_file("bad.mp4"), StubResult::Fail);

    pipeline.orchestrator.run(&pipeline.input).expect("run");
    let snapshot = pipeline.state.snapshot();
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.completed, 1);
    assert!(MarkerStore::err_path(&pipeline.output_file("bad.mp4")).exists());

    let pipeline = pipeline.rewire(plain_metadata, |_| {}, |_| {});
    pipeline.orchestrator.run(&pipeline.input).expect("re-run");
    assert_eq!(
        pipeline.encoder.launch_count(),
        0,
        "error-marked input skipped on the next run"
    );
    assert_eq!(pipeline.state.snapshot().discovery.ignored_err, 1);
}

#[test]
fn av1_and_camera_filters_skip_before_the_encoder() {
    let pipeline = build_pipeline(
        &["already_av1.mp4", "phone.mp4", "drone.mp4"],
        |input| {
            let mut metadata = StubMetadata::default();
            metadata
                .codecs
                .insert(input.join("already_av1.mp4"), "av1".to_string());
            metadata
                .cameras
                .insert(input.join("phone.mp4"), "Apple iPhone 15".to_string());
            metadata
                .cameras
                .insert(input.join("drone.mp4"), "DJI FC8482".to_string());
            metadata
        },
        |config| {
            config.general.skip_av1 = true;
            config.general.filter_cameras = vec!["dji".to_string()];
        },
        |_| {},
    );

    pipeline.orchestrator.run(&pipeline.input).expect("run");

    let snapshot = pipeline.state.snapshot();
    assert_eq!(snapshot.av1_skipped, 1);
    assert_eq!(snapshot.camera_skipped, 1);
    assert_eq!(snapshot.completed, 1);
    assert_eq!(pipeline.encoder.launch_count(), 1);
    assert_eq!(
        pipeline.encoder.launches_for(&pipeline.input_file("drone.mp4")),
        1,
        "only the camera-filter match reaches the encoder"
    );
    // Skips leave no on-disk trace.
    for name in ["already_av1.mp4", "phone.mp4"] {
        assert!(!pipeline.output_file(name).exists());
        assert!(!MarkerStore::err_path(&pipeline.output_file(name)).exists());
    }
}

#[test]
fn output_collision_is_skipped_and_counted() {
    let pipeline = build_pipeline(&["clip.mp4"], plain_metadata, |_| {}, |_| {});
    // A same-stem output OLDER than the source: discovery does not call it
    // done, so the collision check must catch it.
    fs::write(pipeline.output_file("clip.mp4"), b"stale").unwrap();
    thread::sleep(Duration::from_millis(20));
    write_input(&pipeline.input_file("clip.mp4"), 200);

    pipeline.orchestrator.run(&pipeline.input).expect("run");

    assert_eq!(pipeline.encoder.launch_count(), 0);
    let snapshot = pipeline.state.snapshot();
    assert_eq!(snapshot.skipped, 1);
    assert_eq!(snapshot.completed, 0);
    assert_eq!(
        fs::read(pipeline.output_file("clip.mp4")).unwrap(),
        b"stale",
        "collision never overwrites the existing output"
    );
}

#[test]
fn concurrency_stays_within_the_admission_cap() {
    let files: Vec<String> = (0..10).map(|i| format!("f{i}.mp4")).collect();
    let names: Vec<&str> = files.iter().map(String::as_str).collect();
    let pipeline = build_pipeline(
        &names,
        plain_metadata,
        |config| {
            config.general.threads = 2;
            config.general.prefetch_factor = 2;
        },
        |encoder| {
            encoder.delay = Duration::from_millis(40);
        },
    );

    pipeline.orchestrator.run(&pipeline.input).expect("run");

    assert_eq!(pipeline.state.snapshot().completed, 10);
    let max_active = pipeline.encoder.max_active.load(Ordering::SeqCst);
    assert!(
        max_active <= 2,
        "admission cap of 2 was exceeded: saw {max_active} concurrent encodes"
    );
}

#[test]
fn pool_concurrency_is_not_bounded_by_the_initial_ready_count() {
    // One ready file at startup; a refresh then lands five more. The worker
    // pool must still run the refreshed work at the full cap, not at the
    // initial queue size.
    let pipeline = build_pipeline(
        &["seed.mp4"],
        plain_metadata,
        |config| {
            config.general.threads = 4;
        },
        |encoder| {
            encoder.delay = Duration::from_millis(300);
        },
    );

    let bus = pipeline.bus.clone();
    let late: Vec<PathBuf> = (0..5)
        .map(|i| pipeline.input_file(&format!("late{i}.mp4")))
        .collect();
    let publisher = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        for path in &late {
            write_input(path, 100);
        }
        bus.publish(&PipelineEvent::RefreshRequested);
    });

    pipeline.orchestrator.run(&pipeline.input).expect("run");
    publisher.join().unwrap();

    assert_eq!(pipeline.state.snapshot().completed, 6);
    let max_active = pipeline.encoder.max_active.load(Ordering::SeqCst);
    assert!(
        max_active >= 2,
        "refreshed jobs must encode concurrently, saw {max_active}"
    );
}

#[test]
fn graceful_shutdown_drains_in_flight_and_leaves_the_rest_untouched() {
    let files: Vec<String> = (0..10).map(|i| format!("f{i}.mp4")).collect();
    let names: Vec<&str> = files.iter().map(String::as_str).collect();
    let pipeline = build_pipeline(
        &names,
        plain_metadata,
        |config| {
            config.general.threads = 2;
        },
        |encoder| {
            encoder.delay = Duration::from_millis(300);
        },
    );

    let bus = pipeline.bus.clone();
    let publisher = thread::spawn(move || {
        thread::sleep(Duration::from_millis(450));
        bus.publish(&PipelineEvent::RequestShutdown);
    });

    let outcome = pipeline.orchestrator.run(&pipeline.input).expect("run");
    publisher.join().unwrap();

    assert!(!outcome.interrupted, "graceful shutdown is a clean return");
    let snapshot = pipeline.state.snapshot();
    assert!(snapshot.completed >= 2, "in-flight jobs ran to completion");
    assert!(snapshot.completed < 10, "shutdown stopped new submissions");
    assert_eq!(snapshot.interrupted, 0);
    assert_eq!(snapshot.failed, 0);
    assert!(snapshot.shutdown_requested);

    // Every launched supervisor finished; everything else is untouched.
    let launched = pipeline.encoder.launch_count() as u64;
    assert_eq!(launched, snapshot.completed);
    for name in &files {
        let output = pipeline.output_file(name);
        assert!(
            !MarkerStore::tmp_path(&output).exists(),
            "{name}: stale tmp marker"
        );
        assert!(
            !MarkerStore::err_path(&output).exists(),
            "{name}: unexpected err marker"
        );
    }
}

#[test]
fn hard_interrupt_cancels_in_flight_within_the_deadline() {
    let files: Vec<String> = (0..6).map(|i| format!("f{i}.mp4")).collect();
    let names: Vec<&str> = files.iter().map(String::as_str).collect();
    let pipeline = build_pipeline(
        &names,
        plain_metadata,
        |config| {
            config.general.threads = 2;
        },
        |encoder| {
            encoder.wait_for_cancel = true;
        },
    );

    let bus = pipeline.bus.clone();
    let publisher = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        bus.publish(&PipelineEvent::InterruptRequested);
    });

    let started = Instant::now();
    let outcome = pipeline.orchestrator.run(&pipeline.input).expect("run");
    publisher.join().unwrap();

    assert!(outcome.interrupted);
    assert!(
        started.elapsed() < Duration::from_secs(12),
        "scheduler must return within the hard-interrupt deadline"
    );

    let snapshot = pipeline.state.snapshot();
    assert_eq!(snapshot.interrupted, 2, "both admitted supervisors cancelled");
    assert_eq!(snapshot.completed, 0);
    assert!(snapshot.interrupt_requested);

    for name in &files {
        let output = pipeline.output_file(name);
        assert!(!output.exists(), "{name}: no final output after interrupt");
        assert!(
            !MarkerStore::tmp_path(&output).exists(),
            "{name}: tmp must be removed on interrupt"
        );
        assert!(
            !MarkerStore::err_path(&output).exists(),
            "{name}: interrupt writes no err marker"
        );
    }
}

#[test]
fn refresh_drops_deleted_files_and_reports_the_delta() {
    let pipeline = build_pipeline(
        &["a.mp4", "b.mp4", "c.mp4", "d.mp4", "e.mp4"],
        plain_metadata,
        |config| {
            config.general.threads = 1;
        },
        |encoder| {
            encoder.delay = Duration::from_millis(400);
        },
    );

    let actions: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let actions = actions.clone();
        pipeline
            .bus
            .subscribe(EventKind::ActionMessage, move |event| {
                if let PipelineEvent::ActionMessage { text } = event {
                    actions.lock().unwrap().push(text.clone());
                }
            });
    }

    let bus = pipeline.bus.clone();
    let doomed: Vec<PathBuf> = ["d.mp4", "e.mp4"]
        .iter()
        .map(|n| pipeline.input_file(n))
        .collect();
    let publisher = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        for path in &doomed {
            fs::remove_file(path).expect("delete pending input");
        }
        bus.publish(&PipelineEvent::RefreshRequested);
    });

    pipeline.orchestrator.run(&pipeline.input).expect("run");
    publisher.join().unwrap();

    let snapshot = pipeline.state.snapshot();
    assert_eq!(snapshot.completed, 3, "only the surviving files encode");
    assert_eq!(pipeline.encoder.launch_count(), 3);
    assert!(!pipeline.output_file("d.mp4").exists());
    assert!(!pipeline.output_file("e.mp4").exists());

    let actions = actions.lock().unwrap();
    assert!(
        actions.iter().any(|a| a.contains("-2 deleted")),
        "refresh delta must be reported, got {actions:?}"
    );
}

#[test]
fn refresh_picks_up_new_files_without_resubmitting_known_ones() {
    let pipeline = build_pipeline(
        &["a.mp4", "b.mp4"],
        plain_metadata,
        |config| {
            config.general.threads = 1;
        },
        |encoder| {
            encoder.delay = Duration::from_millis(300);
        },
    );

    let bus = pipeline.bus.clone();
    let new_file = pipeline.input_file("late_arrival.mp4");
    let publisher = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        write_input(&new_file, 100);
        bus.publish(&PipelineEvent::RefreshRequested);
    });

    pipeline.orchestrator.run(&pipeline.input).expect("run");
    publisher.join().unwrap();

    assert_eq!(pipeline.state.snapshot().completed, 3);
    assert_eq!(
        pipeline
            .encoder
            .launches_for(&pipeline.input_file("late_arrival.mp4")),
        1
    );
    assert_eq!(
        pipeline.encoder.launches_for(&pipeline.input_file("a.mp4")),
        1,
        "refresh must not resubmit files already seen"
    );
}

#[test]
fn clean_errors_revives_failed_inputs_on_the_next_run() {
    let pipeline = build_pipeline(&["flaky.mp4"], plain_metadata, |_| {}, |_| {});
    pipeline
        .encoder
        .results
        .lock()
        .unwrap()
        .insert(pipeline.input_file("flaky.mp4"), StubResult::Fail);

    pipeline.orchestrator.run(&pipeline.input).expect("first run");
    assert!(MarkerStore::err_path(&pipeline.output_file("flaky.mp4")).exists());

    // Same tree, clean-errors on, encoder healthy this time.
    let pipeline = pipeline.rewire(
        plain_metadata,
        |config| config.general.clean_errors = true,
        |_| {},
    );
    pipeline.orchestrator.run(&pipeline.input).expect("clean run");

    assert_eq!(pipeline.encoder.launch_count(), 1, "input re-attempted");
    assert_eq!(pipeline.state.snapshot().completed, 1);
    assert!(pipeline.output_file("flaky.mp4").exists());
    assert!(
        !MarkerStore::err_path(&pipeline.output_file("flaky.mp4")).exists(),
        "marker cleaned and not rewritten after success"
    );
}

#[test]
fn deleted_input_between_discovery_and_submission_is_skipped() {
    let pipeline = build_pipeline(
        &["a_stable.mp4", "z_vanishing.mp4"],
        plain_metadata,
        |config| {
            config.general.threads = 1;
            config.general.prefetch_factor = 1;
        },
        |encoder| {
            encoder.delay = Duration::from_millis(250);
        },
    );

    // Delete the queued file while the first (alphabetically) one encodes.
    let doomed = pipeline.input_file("z_vanishing.mp4");
    let remover = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        fs::remove_file(&doomed).expect("remove queued input");
    });

    pipeline.orchestrator.run(&pipeline.input).expect("run");
    remover.join().unwrap();

    let snapshot = pipeline.state.snapshot();
    assert_eq!(snapshot.completed, 1);
    assert_eq!(snapshot.skipped, 1, "vanished file counts as skipped");
    assert!(
        !MarkerStore::err_path(&pipeline.output_file("z_vanishing.mp4")).exists(),
        "no marker for a vanished input"
    );
}

#[test]
fn thread_control_events_adjust_the_cap_and_notify() {
    let pipeline = build_pipeline(
        &["a.mp4"],
        plain_metadata,
        |config| {
            config.general.threads = 2;
        },
        |_| {},
    );

    let threads_seen = Arc::new(AtomicUsize::new(0));
    {
        let threads_seen = threads_seen.clone();
        pipeline
            .bus
            .subscribe(EventKind::ThreadCountChanged, move |event| {
                if let PipelineEvent::ThreadCountChanged { current } = event {
                    threads_seen.store(*current, Ordering::SeqCst);
                }
            });
    }

    pipeline
        .bus
        .publish(&PipelineEvent::ThreadControlEvent { change: 1 });
    assert_eq!(threads_seen.load(Ordering::SeqCst), 3);
    assert_eq!(pipeline.state.snapshot().current_threads, 3);

    pipeline
        .bus
        .publish(&PipelineEvent::ThreadControlEvent { change: -1 });
    pipeline
        .bus
        .publish(&PipelineEvent::ThreadControlEvent { change: -1 });
    assert_eq!(pipeline.state.snapshot().current_threads, 1);

    // Floor: another decrease is a no-op and publishes nothing.
    threads_seen.store(0, Ordering::SeqCst);
    pipeline
        .bus
        .publish(&PipelineEvent::ThreadControlEvent { change: -1 });
    assert_eq!(threads_seen.load(Ordering::SeqCst), 0);
}
