//! Integration tests for scheduler lifecycles, on-demand triggering and
//! disposal.

mod support;

use std::sync::Arc;
use std::time::Duration;

use cadence_common::testing::wait_until;
use cadence_common::{LifecycleState, Transition};
use cadence_infra::config::{self, FixedFrequencyConfig};
use cadence_infra::scheduling::{
    create_from_definition, polling_scheduler_name, CronScheduler, FixedFrequencyScheduler,
    FixedFrequencySchedulerFactory, InMemorySchedulerRegistry, Scheduler, SchedulerFactory,
    SchedulerFactoryContext, SchedulerRegistry,
};
use support::{failing_job, init_test_tracing, CountingJob};

fn fixed(
    name: &str,
    job: &CountingJob,
    frequency: Duration,
    delay: Duration,
) -> Arc<FixedFrequencyScheduler> {
    Arc::new(FixedFrequencyScheduler::new(name, job.job(), frequency, delay).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_apply_exactly_once() {
    init_test_tracing();
    let job = CountingJob::new();
    let scheduler = fixed("race.polling.1", &job, Duration::from_secs(60), Duration::from_secs(60));
    scheduler.initialise().await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.start().await })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_applied() {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(scheduler.state(), LifecycleState::Started);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.stop().await })
        })
        .collect();
    let mut applied = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_applied() {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(scheduler.state(), LifecycleState::Stopped);

    scheduler.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn start_stop_start_resumes_periodic_runs() {
    init_test_tracing();
    let job = CountingJob::new();
    let scheduler = fixed("cycle.polling.1", &job, Duration::from_secs(1), Duration::ZERO);
    scheduler.initialise().await.unwrap();

    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(job.runs(), 3);

    scheduler.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(job.runs(), 3);

    assert!(scheduler.start().await.unwrap().is_applied());
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(job.runs(), 5);

    scheduler.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn start_abandons_pending_on_demand_work() {
    init_test_tracing();
    let job = CountingJob::taking(Duration::from_secs(10));
    let scheduler =
        fixed("handover.polling.1", &job, Duration::from_secs(3600), Duration::from_secs(3600));
    scheduler.initialise().await.unwrap();
    scheduler.start().await.unwrap();
    scheduler.stop().await.unwrap();

    scheduler.schedule().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(scheduler.start().await.unwrap().is_applied());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(job.runs(), 0);
    assert_eq!(scheduler.metrics().snapshot().on_demand_runs, 1);

    scheduler.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn failing_jobs_keep_the_schedule_alive() {
    init_test_tracing();
    let scheduler = FixedFrequencyScheduler::new(
        "failing.polling.1",
        failing_job(),
        Duration::from_millis(100),
        Duration::ZERO,
    )
    .unwrap();
    scheduler.initialise().await.unwrap();
    scheduler.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(450)).await;
    let snapshot = scheduler.metrics().snapshot();
    assert_eq!(snapshot.job_failures, 5);
    assert_eq!(snapshot.job_successes, 0);
    assert_eq!(scheduler.state(), LifecycleState::Started);

    scheduler.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn slow_jobs_are_timed_out_and_counted() {
    init_test_tracing();
    let job = CountingJob::taking(Duration::from_secs(5));
    let scheduler = FixedFrequencyScheduler::new(
        "slow.polling.1",
        job.job(),
        Duration::from_secs(10),
        Duration::ZERO,
    )
    .unwrap()
    .with_job_timeout(Some(Duration::from_secs(1)));
    scheduler.initialise().await.unwrap();
    scheduler.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(scheduler.metrics().snapshot().job_timeouts, 1);
    assert_eq!(job.runs(), 0);

    scheduler.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn dispose_forces_termination_after_default_timeout() {
    init_test_tracing();
    let job = CountingJob::taking(Duration::from_secs(3600));
    let scheduler = fixed("stuck.polling.1", &job, Duration::from_secs(1), Duration::ZERO);
    scheduler.initialise().await.unwrap();
    scheduler.start().await.unwrap();
    scheduler.stop().await.unwrap();
    scheduler.schedule().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let started = tokio::time::Instant::now();
    assert!(scheduler.dispose().await.is_applied());
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(5), "waited {elapsed:?}");
    assert!(elapsed < Duration::from_secs(6), "waited {elapsed:?}");
    assert_eq!(scheduler.state(), LifecycleState::Disposed);
    assert_eq!(
        scheduler.dispose().await,
        Transition::AlreadyInState(LifecycleState::Disposed)
    );
}

#[tokio::test(start_paused = true)]
async fn dispose_after_restart_cancels_runs_from_before_the_stop() {
    init_test_tracing();
    let job = CountingJob::taking(Duration::from_secs(10));
    let scheduler = FixedFrequencyScheduler::new(
        "restart.polling.1",
        job.job(),
        Duration::from_secs(3600),
        Duration::ZERO,
    )
    .unwrap()
    .with_dispose_timeout(Duration::from_millis(100));
    scheduler.initialise().await.unwrap();

    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    scheduler.stop().await.unwrap();
    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(scheduler.metrics().snapshot().periodic_runs, 2);

    let started = tokio::time::Instant::now();
    assert!(scheduler.dispose().await.is_applied());
    assert!(started.elapsed() < Duration::from_millis(200), "waited {:?}", started.elapsed());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(job.runs(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stops_hand_over_once() {
    init_test_tracing();
    let job = CountingJob::new();
    let scheduler =
        fixed("stops.polling.1", &job, Duration::from_secs(3600), Duration::from_secs(3600));
    scheduler.initialise().await.unwrap();
    scheduler.start().await.unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.stop().await })
        })
        .collect();
    let mut applied = 0;
    for handle in handles {
        let transition = handle.await.unwrap().unwrap();
        if transition.is_applied() {
            applied += 1;
        } else {
            assert_eq!(transition, Transition::AlreadyInState(LifecycleState::Stopped));
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(scheduler.state(), LifecycleState::Stopped);

    scheduler.schedule().unwrap();
    assert!(
        wait_until(Duration::from_secs(2), Duration::from_millis(5), || job.runs() == 1).await
    );
    assert_eq!(scheduler.metrics().snapshot().on_demand_runs, 1);

    scheduler.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn dispose_racing_stop_ends_disposed() {
    init_test_tracing();
    let job = CountingJob::new();
    let scheduler = fixed("racing.polling.1", &job, Duration::from_millis(50), Duration::ZERO);
    scheduler.initialise().await.unwrap();
    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    let (stopped, disposed) = tokio::join!(scheduler.stop(), scheduler.dispose());
    assert!(stopped.is_ok());
    assert!(disposed.is_applied());
    assert_eq!(scheduler.state(), LifecycleState::Disposed);

    let runs = job.runs();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(job.runs(), runs);
    assert!(scheduler.schedule().is_err());
    assert!(scheduler.start().await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn cron_dispose_is_bounded_by_one_deadline() {
    init_test_tracing();
    let job = CountingJob::taking(Duration::from_secs(3600));
    let scheduler = CronScheduler::new("reports.polling.1", job.job(), "* * * * * *", None)
        .unwrap()
        .with_dispose_timeout(Duration::from_millis(300));
    scheduler.initialise().await.unwrap();
    scheduler.start().await.unwrap();

    assert!(
        wait_until(Duration::from_secs(4), Duration::from_millis(20), || {
            scheduler.metrics().snapshot().periodic_runs >= 1
        })
        .await
    );

    let started = tokio::time::Instant::now();
    assert!(scheduler.dispose().await.is_applied());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(250), "waited {elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "waited {elapsed:?}");
    assert_eq!(scheduler.state(), LifecycleState::Disposed);
    assert_eq!(job.runs(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn factory_built_schedulers_are_registered_and_disposed_together() {
    init_test_tracing();
    let registry = Arc::new(InMemorySchedulerRegistry::new());
    let context = SchedulerFactoryContext::builder().registry(registry.clone()).build();
    let factory = FixedFrequencySchedulerFactory::new(
        FixedFrequencyConfig { frequency: 20, ..Default::default() },
        context,
    );

    let jobs: Vec<CountingJob> = (0..3).map(|_| CountingJob::new()).collect();
    for (id, job) in jobs.iter().enumerate() {
        let scheduler = factory.create(&polling_scheduler_name("orders", id), job.job()).unwrap();
        scheduler.initialise().await.unwrap();
        scheduler.start().await.unwrap();
    }

    assert_eq!(registry.polling_schedulers_for("orders").len(), 3);
    assert!(
        wait_until(Duration::from_secs(3), Duration::from_millis(10), || {
            jobs.iter().all(|job| job.runs() >= 2)
        })
        .await
    );

    let on_demand = registry.get("orders.polling.1").unwrap();
    on_demand.stop().await.unwrap();
    let before = jobs[1].runs();
    on_demand.schedule().unwrap();
    assert!(
        wait_until(Duration::from_secs(2), Duration::from_millis(5), || {
            jobs[1].runs() > before
        })
        .await
    );

    assert_eq!(registry.dispose_all().await, 3);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn configuration_drives_scheduler_creation() {
    init_test_tracing();
    let config = config::from_toml_str(
        r#"
        [[schedulers]]
        name = "orders.polling.1"

        [schedulers.fixed_frequency]
        frequency = 5
        start_delay = 1
        time_unit = "seconds"

        [[schedulers]]
        name = "reports.polling.1"

        [schedulers.cron]
        expression = "0 0 6 * * *"
        time_zone = "Europe/Paris"
        "#,
    )
    .unwrap();

    let registry = Arc::new(InMemorySchedulerRegistry::new());
    let context = SchedulerFactoryContext::builder().registry(registry.clone()).build();
    for definition in &config.schedulers {
        create_from_definition(definition, CountingJob::new().job(), &context).unwrap();
    }

    let names: Vec<String> = registry
        .polling_schedulers()
        .iter()
        .map(|scheduler| scheduler.name().to_string())
        .collect();
    assert_eq!(names, ["orders.polling.1", "reports.polling.1"]);
    assert!(registry.get("reports.polling.1").is_some());

    registry.dispose_all().await;
}
