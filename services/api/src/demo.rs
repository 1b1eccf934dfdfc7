use chrono::{Duration, Utc};
use clap::Args;
use leadflow::config::EngineConfig;
use leadflow::error::AppError;
use leadflow::workflows::nurture::{
    CompanySize, ContactTimezone, EngagementKind, LandingPageActivity, LandingPageId, Lead,
    LeadId, LeadStatus, OwnerId, QualificationLevel, RecordStore, SubscriptionTier,
};

use crate::infra::build_processor;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Subscription tier driving sequence depth and call limits
    #[arg(long, default_value = "starter")]
    tier: String,
    /// Pre-resolved UTC offset for the demo lead, in minutes
    #[arg(long, default_value_t = -300)]
    utc_offset_minutes: i32,
}

fn parse_tier(raw: &str) -> SubscriptionTier {
    match raw.trim().to_ascii_lowercase().as_str() {
        "growth" => SubscriptionTier::Growth,
        "scale" => SubscriptionTier::Scale,
        "enterprise" => SubscriptionTier::Enterprise,
        _ => SubscriptionTier::Starter,
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let tier = parse_tier(&args.tier);
    let (processor, store) = build_processor(EngineConfig::default());
    let service = processor.service().clone();
    let now = Utc::now();

    let lead = Lead {
        id: LeadId("demo-lead".to_string()),
        owner: OwnerId("demo-user".to_string()),
        tier,
        first_name: Some("Dana".to_string()),
        last_name: Some("Whitfield".to_string()),
        email: Some("dana.whitfield@acmeco.com".to_string()),
        phone: Some("+1-555-0140".to_string()),
        company: Some("AcmeCo".to_string()),
        title: Some("VP of Operations".to_string()),
        industry: Some("Technology".to_string()),
        company_size: Some(CompanySize::Enterprise),
        linkedin_url: Some("https://linkedin.com/in/dwhitfield".to_string()),
        location: Some("New York, NY".to_string()),
        timezone: Some(ContactTimezone::new("demo/offset", args.utc_offset_minutes)),
        status: LeadStatus::Cold,
        score: 0,
        qualification_level: QualificationLevel::Cold,
        ready_for_call: false,
        last_engagement_at: None,
        last_scored_at: None,
        engagement_summary: None,
        created_at: now - Duration::days(14),
    };
    let lead_id = lead.id.clone();
    store
        .insert_lead(lead)
        .map_err(|err| AppError::Automation(err.into()))?;
    store
        .upsert_landing_page(LandingPageActivity {
            id: LandingPageId("demo-page".to_string()),
            lead_id: lead_id.clone(),
            views: 3,
            conversions: 1,
            last_viewed_at: Some(now - Duration::days(1)),
            metrics: None,
        })
        .map_err(|err| AppError::Automation(err.into()))?;

    println!("Lead nurture automation demo ({} tier)", tier.label());
    println!("Seeded lead demo-lead with a full profile and landing-page activity\n");

    println!("Recording engagement history");
    for (kind, hours_ago) in [
        (EngagementKind::Opened, 30),
        (EngagementKind::Opened, 26),
        (EngagementKind::PageView, 25),
        (EngagementKind::Opened, 4),
        (EngagementKind::Opened, 3),
    ] {
        let update = service
            .record_engagement(&lead_id, kind, now - Duration::hours(hours_ago), now)
            .map_err(AppError::Automation)?;
        println!(
            "- {} ({}h ago): {:+} -> score {}",
            kind.label(),
            hours_ago,
            update.score_change,
            update.new_score
        );
    }

    let update = service
        .record_engagement(&lead_id, EngagementKind::Clicked, now - Duration::minutes(30), now)
        .map_err(AppError::Automation)?;
    println!(
        "- clicked (30m ago): {:+} -> score {}\n",
        update.score_change, update.new_score
    );

    let report = match update.report {
        Some(report) => report,
        None => service.score_lead(&lead_id, now).map_err(AppError::Automation)?,
    };
    println!("Score breakdown");
    println!("- profile quality:    {}/25", report.breakdown.profile_quality);
    println!("- engagement:         {}/30", report.breakdown.engagement_score);
    println!("- behavioral signals: {}/25", report.breakdown.behavioral_signals);
    println!("- company fit:        {}/15", report.breakdown.company_fit);
    println!("- timing:             {}/5", report.breakdown.timing_indicators);
    println!(
        "Total {}/100 ({}) - {}\n",
        report.total_score,
        report.level.label(),
        report.assessment
    );

    let compliance = service
        .compliance_check(&lead_id, now)
        .map_err(AppError::Automation)?;
    println!("Compliance gate: {}", compliance.reason);
    for requirement in &compliance.requirements_met {
        println!("- [met] {requirement}");
    }
    for requirement in &compliance.requirements_failed {
        println!("- [failed] {requirement}");
    }
    println!();

    let sequence = service
        .start_sequence(&lead_id, now)
        .map_err(AppError::Automation)?;
    println!(
        "Started {} sequence ({} steps)\n",
        sequence.kind.label(),
        sequence.total_steps
    );

    println!("Processing the task queue (immediate batch)");
    let batch = processor
        .process_due(now)
        .await
        .map_err(|err| AppError::Automation(err.into()))?;
    for outcome in &batch.outcomes {
        println!("- {} [{}]: {:?}", outcome.task_id, outcome.action, outcome.disposition);
    }

    println!("\nProcessing the task queue (promotion window, +4h)");
    let batch = processor
        .process_due(now + Duration::hours(4))
        .await
        .map_err(|err| AppError::Automation(err.into()))?;
    for outcome in &batch.outcomes {
        println!("- {} [{}]: {:?}", outcome.task_id, outcome.action, outcome.disposition);
        if let Some(detail) = &outcome.detail {
            println!("  {detail}");
        }
    }

    let status = processor
        .queue_status(now + Duration::hours(4))
        .map_err(|err| AppError::Automation(err.into()))?;
    println!(
        "\nQueue status: {} tasks total, {} pending, {} completed, {} failed, {} overdue",
        status.total_tasks,
        status.by_status.pending,
        status.by_status.completed,
        status.by_status.failed,
        status.overdue_tasks
    );

    Ok(())
}
