use crate::jobs::render_sweep_report;
use chrono::{Duration, NaiveDate, Utc};
use clap::Args;
use edunexia::config::SweepConfig;
use edunexia::error::AppError;
use edunexia::workflows::cancellations::{
    CancellationReason, CancellationService, CancellationStatus, CancellationSubmission,
    RequestFilters, ReviewDecision, ReviewerId,
};
use edunexia::workflows::enrollments::{
    CourseId, Enrollment, EnrollmentId, EnrollmentServiceError, EnrollmentStatus,
    PaymentPlanId, StudentId,
};
use edunexia::{InMemoryStore, SystemClock};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Sweep threshold in days (defaults to 90)
    #[arg(
        long,
        value_parser = clap::value_parser!(i64).range(1..=SweepConfig::MAX_THRESHOLD_DAYS)
    )]
    pub(crate) threshold_days: Option<i64>,
    /// Skip the automatic delinquency sweep portion of the demo.
    #[arg(long)]
    pub(crate) skip_sweep: bool,
}

struct DemoStudent {
    name: &'static str,
    status: EnrollmentStatus,
    idle_days: i64,
}

const STUDENTS: [DemoStudent; 4] = [
    DemoStudent {
        name: "Ana Souza",
        status: EnrollmentStatus::Active,
        idle_days: 12,
    },
    DemoStudent {
        name: "Bruno Lima",
        status: EnrollmentStatus::Delinquent,
        idle_days: 134,
    },
    DemoStudent {
        name: "Carla Mendes",
        status: EnrollmentStatus::Delinquent,
        idle_days: 101,
    },
    DemoStudent {
        name: "Diego Rocha",
        status: EnrollmentStatus::Delinquent,
        idle_days: 41,
    },
];

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let sweep = SweepConfig {
        threshold_days: args
            .threshold_days
            .unwrap_or(SweepConfig::DEFAULT_THRESHOLD_DAYS),
    };
    let store = InMemoryStore::new();
    let enrollments = seed_demo_store(&store)?;
    let service = CancellationService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(SystemClock),
        sweep,
    );

    println!("Enrollment cancellation demo");
    print_enrollments(&store, &enrollments);

    let (ana, _) = enrollments[0];
    println!("\nAna asks to cancel (motivo: financeiro)");
    let request = match service
        .request(
            ana,
            CancellationSubmission {
                reason: CancellationReason::Financial,
                description: Some("Perdi o emprego".to_string()),
            },
        )
        .await
    {
        Ok(request) => request,
        Err(err) => {
            println!("  Request rejected: {}", err);
            return Ok(());
        }
    };
    println!("- Request {} -> {}", request.id, request.status);

    match service
        .request(
            ana,
            CancellationSubmission {
                reason: CancellationReason::Other,
                description: None,
            },
        )
        .await
    {
        Ok(duplicate) => println!("  Unexpected duplicate accepted: {}", duplicate.id),
        Err(err) => println!("  Second request refused: {}", err),
    }

    let (carla, _) = enrollments[2];
    println!("\nCarla (delinquent) files a request that stays pending");
    match service
        .request(
            carla,
            CancellationSubmission {
                reason: CancellationReason::Relocation,
                description: Some("Mudança para Recife".to_string()),
            },
        )
        .await
    {
        Ok(pending) => println!("- Request {} -> {}", pending.id, pending.status),
        Err(err) => println!("  Request rejected: {}", err),
    }

    let pending = service
        .list(&RequestFilters {
            status: Some(CancellationStatus::Pending),
            ..RequestFilters::default()
        })
        .await?;
    println!("\nPending queue ({} requests)", pending.meta.total);
    for item in &pending.data {
        println!(
            "  - {} | {} | {}",
            item.request.id,
            item.enrollment.student_name.as_deref().unwrap_or("?"),
            item.request.reason.description()
        );
    }

    println!("\nSecretaria approves Ana's request");
    let reviewer = ReviewerId("secretaria-01".to_string());
    match service
        .review(
            request.id,
            ReviewDecision {
                status: CancellationStatus::Approved,
                notes: Some("Documentação conferida".to_string()),
            },
            &reviewer,
        )
        .await
    {
        Ok(reviewed) => println!(
            "- Request {} -> {} by {}",
            reviewed.id,
            reviewed.status,
            reviewed
                .reviewed_by
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default()
        ),
        Err(err) => println!("  Review failed: {}", err),
    }
    if let Some(enrollment) = store.enrollment(ana) {
        println!(
            "  Enrollment now {} | notes: {}",
            enrollment.status,
            enrollment.notes.as_deref().unwrap_or("")
        );
    }

    if args.skip_sweep {
        return Ok(());
    }

    println!();
    let report = service.run_sweep().await?;
    render_sweep_report(&report);

    println!("\nFinal enrollment states");
    print_enrollments(&store, &enrollments);
    Ok(())
}

fn seed_demo_store(
    store: &InMemoryStore,
) -> Result<Vec<(EnrollmentId, &'static str)>, AppError> {
    let now = Utc::now();
    let course = CourseId(Uuid::new_v4());
    let plan = PaymentPlanId(Uuid::new_v4());
    store
        .register_course(course, "Licenciatura em Pedagogia")
        .map_err(EnrollmentServiceError::from)?;

    let mut seeded = Vec::with_capacity(STUDENTS.len());
    for student in &STUDENTS {
        let student_id = StudentId(Uuid::new_v4());
        store
            .register_student(student_id, student.name)
            .map_err(EnrollmentServiceError::from)?;

        let touched = now - Duration::days(student.idle_days);
        let enrollment = Enrollment {
            id: EnrollmentId::generate(),
            student_id,
            course_id: course,
            payment_plan_id: plan,
            status: student.status,
            start_date: NaiveDate::from_ymd_opt(2025, 2, 3).unwrap_or(now.date_naive()),
            end_date: None,
            notes: None,
            created_at: touched - Duration::days(30),
            updated_at: touched,
        };
        seeded.push((enrollment.id, student.name));
        store
            .seed_enrollments([enrollment])
            .map_err(EnrollmentServiceError::from)?;
    }

    Ok(seeded)
}

fn print_enrollments(store: &InMemoryStore, enrollments: &[(EnrollmentId, &'static str)]) {
    for (id, name) in enrollments {
        if let Some(enrollment) = store.enrollment(*id) {
            let idle = (Utc::now() - enrollment.updated_at).num_days();
            println!(
                "  - {:<13} {:<13} last update {} days ago",
                name,
                enrollment.status.label(),
                idle
            );
        }
    }
}
