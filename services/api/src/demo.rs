use crate::infra::{
    demo_business_id, demo_job_id, register_demo_documents, seed_demo_data, KeywordScoringModel,
    MemoryTables,
};
use clap::Args;
use hireflow::config::{PipelineConfig, ScoringConfig};
use hireflow::error::AppError;
use hireflow::intake::{
    ExtractionOutcome, RankingRequest, Recommendation, ReviewPipeline, ReviewQueue, ScoringHints,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Number of candidates to shortlist (clamped to 1-20, default 3)
    #[arg(long)]
    pub(crate) count: Option<i64>,
    /// Stop after extraction and the review queue; skip recording a review and ranking.
    #[arg(long)]
    pub(crate) skip_ranking: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    run_demo_on(&MemoryTables::default(), args).await
}

async fn run_demo_on(tables: &MemoryTables, args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        count,
        skip_ranking,
    } = args;

    seed_demo_data(tables)?;
    let pipeline = ReviewPipeline::new(
        tables.deps(
            Arc::new(tables.objects.clone()),
            Arc::new(KeywordScoringModel),
        ),
        &PipelineConfig::default(),
        &ScoringConfig::default(),
    );

    println!("Hireflow review demo");
    let registered = register_demo_documents(&pipeline)?;
    println!("Registered {registered} resumes for extraction");

    drain_documents(&pipeline).await?;

    let job_id = demo_job_id();
    let business_id = demo_business_id();
    let queue = pipeline.review_queue(&job_id, &business_id)?;
    render_queue(&queue);

    if skip_ranking {
        return Ok(());
    }

    if let Some(first) = queue.queue.first() {
        let summary =
            pipeline.record_review(&job_id, &business_id, &first.application_id, None)?;
        println!(
            "\nReviewed {} ({}/{} done); next up: {}",
            first.applicant_name,
            summary.reviewed_count,
            summary.total_applications,
            summary
                .next_application_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "nothing, queue finished".to_string())
        );
    }

    let shortlist = pipeline
        .recommend(
            &job_id,
            &business_id,
            RankingRequest {
                count,
                hints: ScoringHints::default(),
            },
        )
        .await?;
    render_shortlist(&shortlist);

    Ok(())
}

async fn drain_documents(pipeline: &ReviewPipeline) -> Result<(), AppError> {
    println!("\nExtraction");
    loop {
        match pipeline.process_next(None).await? {
            ExtractionOutcome::Processed { document, method } => println!(
                "  - {} for {} via {}",
                document.storage_path,
                document.application_id,
                method.label()
            ),
            ExtractionOutcome::Idle => {
                println!("  queue drained");
                return Ok(());
            }
        }
    }
}

fn render_queue(queue: &ReviewQueue) {
    println!(
        "\nReview queue ({} applications, {} reviewed)",
        queue.summary.total_applications, queue.summary.reviewed_count
    );
    for entry in &queue.queue {
        let rating = entry
            .ai_rating
            .map(|rating| format!("{rating:.1}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}. {:<14} ai {:>4}  {}",
            entry.position,
            entry.applicant_name,
            rating,
            entry.ai_summary.as_deref().unwrap_or("")
        );
    }
}

fn render_shortlist(shortlist: &[Recommendation]) {
    println!("\nShortlist");
    if shortlist.is_empty() {
        println!("  no rated candidates");
        return;
    }
    for (rank, candidate) in shortlist.iter().enumerate() {
        println!(
            "  #{} {} <{}> rated {:.1}: {}",
            rank + 1,
            candidate.name,
            candidate.email,
            candidate.rating,
            candidate.summary
        );
    }
}
