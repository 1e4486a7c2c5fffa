//! timerec CLI: track activities, manage jobs, run the reconcile loop.

use std::sync::Arc;

use chrono::TimeDelta;
use clap::{Parser, Subcommand};
use timerec::clock::parse_offset;
use timerec::config::Config;
use timerec::engine::{
    ActivityEngine, CompleteJob, ExtendActivity, FinishActivity, FinishOutcome, JobEngine,
    LoopConfig, Providers, ReconcileLoop, Reconciler, StartActivity, UpdateJob, UserEngine,
};
use timerec::model::{Activity, Job};
use timerec::telemetry::init_telemetry;

#[derive(Parser)]
#[command(name = "timerec", about = "Activity timer and job time recording")]
struct Cli {
    /// User to act as (defaults to $USER)
    #[arg(long, short, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reconcile loop until Ctrl-C
    Serve,
    /// Run a single reconcile pass and print the result
    Reconcile,
    /// Activity operations
    Activity {
        #[command(subcommand)]
        action: ActivityAction,
    },
    /// Job operations
    Job {
        #[command(subcommand)]
        action: JobAction,
    },
    /// User operations
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum ActivityAction {
    /// Show the current activity
    Show,
    /// Start an activity
    Start {
        name: String,
        #[arg(long, short, default_value = "")]
        comment: String,
        /// Start relative to now, e.g. -15m
        #[arg(long, value_parser = offset_arg, allow_hyphen_values = true)]
        offset: Option<TimeDelta>,
        /// Time until the estimate deadline, e.g. 1h30m
        #[arg(long, value_parser = offset_arg, allow_hyphen_values = true)]
        estimate: Option<TimeDelta>,
    },
    /// Push the estimate deadline and add a comment
    Extend {
        #[arg(long, short, default_value = "")]
        comment: String,
        /// Replace the comment instead of appending
        #[arg(long)]
        reset: bool,
        #[arg(long, value_parser = offset_arg, allow_hyphen_values = true)]
        estimate: Option<TimeDelta>,
    },
    /// Show the activity and sleep until its estimate deadline
    Wait {
        /// Run a reconcile pass on wake-up so the expiry is reported
        #[arg(long)]
        reconcile: bool,
    },
    /// Record the activity on a job and clear it
    Finish {
        job: String,
        #[arg(long, short, default_value = "")]
        comment: String,
        /// End relative to now, e.g. -5m
        #[arg(long, value_parser = offset_arg, allow_hyphen_values = true)]
        offset: Option<TimeDelta>,
    },
}

#[derive(Subcommand)]
enum JobAction {
    /// Show a job
    Show { name: String },
    /// List jobs
    List,
    /// Create a job unless it exists
    Create { name: String },
    /// Patch job fields
    Update {
        name: String,
        #[arg(long, short)]
        template: Option<String>,
        /// Use the job name as its title
        #[arg(long, short = 'n', conflicts_with = "title")]
        use_name_as_title: bool,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        task: Option<String>,
    },
    /// Write records for every entry and delete the job
    Complete { name: String },
    /// Delete the job without writing records
    Cancel { name: String },
}

#[derive(Subcommand)]
enum UserAction {
    /// Show user settings and state
    Show,
    /// Exclude the user from reconciliation
    Pause,
    /// Include the user in reconciliation again
    Resume,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let user = cli
        .user
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "me".to_string());

    match cli.command {
        Command::Serve => cmd_serve(&config).await,
        Command::Reconcile => cmd_reconcile(&config).await,
        Command::Activity { action } => {
            let providers = config.providers().await?;
            cmd_activity(&config, &providers, &user, action).await
        }
        Command::Job { action } => {
            let providers = config.providers().await?;
            cmd_job(&providers, &user, action).await
        }
        Command::User { action } => {
            let providers = config.providers().await?;
            cmd_user(&providers, &user, action).await
        }
    }
}

fn offset_arg(s: &str) -> Result<TimeDelta, String> {
    parse_offset(s).map_err(|e| e.to_string())
}

fn reconcile_loop(config: &Config, providers: &Providers) -> ReconcileLoop {
    let reconciler = Reconciler::with_default_checks(providers, config.timezone);
    ReconcileLoop::new(
        Arc::new(reconciler),
        LoopConfig {
            default_interval: config.reconcile_interval,
        },
    )
}

async fn cmd_serve(config: &Config) -> anyhow::Result<()> {
    let _guard = init_telemetry(config.telemetry())?;

    let providers = config.providers().await?;
    let control = reconcile_loop(config, &providers);

    let ctrl = control.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        ctrl.shutdown();
    });

    control.run().await;
    Ok(())
}

async fn cmd_reconcile(config: &Config) -> anyhow::Result<()> {
    let _guard = init_telemetry(config.telemetry())?;

    let providers = config.providers().await?;
    let report = reconcile_loop(config, &providers).run_once().await?;

    println!("Users:      {}", report.users);
    println!("Checks:     {}/{}", report.reported, report.launched);
    println!("OK:         {}", report.result.ok);
    println!("Requeue:    {}", report.result.requeue);
    println!(
        "Next pass:  {}s",
        report.result.next_delay(config.reconcile_interval).as_secs()
    );
    Ok(())
}

async fn cmd_activity(
    config: &Config,
    providers: &Providers,
    user: &str,
    action: ActivityAction,
) -> anyhow::Result<()> {
    let engine = ActivityEngine::new(providers);

    match action {
        ActivityAction::Show => {
            print_activity(&engine.get_activity(user).await?);
        }
        ActivityAction::Start {
            name,
            comment,
            offset,
            estimate,
        } => {
            let mut params = StartActivity::new(user, name)
                .comment(comment)
                .start_offset(offset.unwrap_or(TimeDelta::zero()));
            if let Some(estimate) = estimate {
                params = params.estimate(estimate);
            }
            print_activity(&engine.start_activity(params).await?);
        }
        ActivityAction::Extend {
            comment,
            reset,
            estimate,
        } => {
            let mut params = ExtendActivity::new(user)
                .comment(comment)
                .reset_comment(reset);
            if let Some(estimate) = estimate {
                params = params.estimate(estimate);
            }
            print_activity(&engine.extend_activity(params).await?);
        }
        ActivityAction::Finish {
            job,
            comment,
            offset,
        } => {
            let params = FinishActivity::new(user, &job)
                .comment(comment)
                .end_offset(offset.unwrap_or(TimeDelta::zero()));
            match engine.finish_activity(params).await? {
                FinishOutcome::Idle => println!("No activity active."),
                FinishOutcome::Finished { job, entry } => {
                    println!(
                        "Recorded {} - {} on {}",
                        entry.start.format("%Y-%m-%d %H:%M"),
                        entry.end.format("%H:%M"),
                        job.name
                    );
                }
            }
        }
        ActivityAction::Wait { reconcile } => {
            print_activity(&engine.get_activity(user).await?);
            let Some(remaining) = engine.time_remaining(user).await? else {
                return Ok(());
            };
            let remaining = remaining.to_std()?;
            tokio::select! {
                _ = tokio::signal::ctrl_c() => return Ok(()),
                _ = tokio::time::sleep(remaining) => {}
            }
            println!("Estimate reached.");
            if reconcile {
                let report = reconcile_loop(config, providers).run_once().await?;
                println!("Reconciled: ok={}", report.result.ok);
            }
        }
    }
    Ok(())
}

async fn cmd_job(providers: &Providers, user: &str, action: JobAction) -> anyhow::Result<()> {
    let engine = JobEngine::new(providers);

    match action {
        JobAction::Show { name } => match engine.get_job(user, &name).await? {
            Some(job) => print_job(&job),
            None => anyhow::bail!("no job named '{name}'"),
        },
        JobAction::List => {
            let jobs = engine.list_jobs(user).await?;
            if jobs.is_empty() {
                println!("No jobs found.");
                return Ok(());
            }
            println!("{:<24}  {:<7}  {:<30}  CREATED", "NAME", "ENTRIES", "TITLE");
            println!("{}", "-".repeat(80));
            for job in &jobs {
                println!(
                    "{:<24}  {:<7}  {:<30}  {}",
                    job.name,
                    job.entries.len(),
                    job.template.title,
                    job.created_at.format("%Y-%m-%d %H:%M")
                );
            }
            println!("\n{} job(s)", jobs.len());
        }
        JobAction::Create { name } => {
            let created = engine.create_job_if_missing(user, &name).await?;
            if created.created {
                println!("Created: {}", created.job.name);
            } else {
                println!("Exists:  {}", created.job.name);
            }
        }
        JobAction::Update {
            name,
            template,
            use_name_as_title,
            title,
            description,
            project,
            task,
        } => {
            let title = if use_name_as_title {
                Some(name.clone())
            } else {
                title
            };
            let params = UpdateJob {
                template,
                title,
                description,
                project,
                task,
                ..UpdateJob::new(user, name)
            };
            print_job(&engine.update_job(params).await?);
        }
        JobAction::Complete { name } => {
            let done = engine.complete_job(CompleteJob::finished(user, name)).await?;
            println!(
                "Completed: {} ({} record(s))",
                done.job.name,
                done.records.len()
            );
        }
        JobAction::Cancel { name } => {
            let done = engine.complete_job(CompleteJob::cancelled(user, name)).await?;
            println!("Cancelled: {}", done.job.name);
        }
    }
    Ok(())
}

async fn cmd_user(providers: &Providers, user: &str, action: UserAction) -> anyhow::Result<()> {
    let engine = UserEngine::new(providers);

    let user = match action {
        UserAction::Show => engine.create_user_if_missing(user).await?.user,
        UserAction::Pause => engine.set_inactive(user, true).await?,
        UserAction::Resume => engine.set_inactive(user, false).await?,
    };

    let weekdays: Vec<String> = user.settings.weekdays.iter().map(|d| d.to_string()).collect();
    println!("User:       {}", user.name);
    println!("Paused:     {}", user.inactive);
    println!("Round to:   {}s", user.settings.round_to.as_secs());
    println!("Alarm at:   {}s", user.settings.missed_work_alarm.as_secs());
    println!("Weekdays:   {}", weekdays.join(", "));
    println!("Estimate:   {}s", user.settings.default_estimate.as_secs());
    println!("---");
    print_activity(&user.activity);
    Ok(())
}

fn print_activity(activity: &Activity) {
    if !activity.is_active() {
        println!("No activity active.");
        return;
    }
    println!("Activity:   {}", activity.name);
    if let Some(start) = activity.start {
        println!("Started:    {}", start.format("%Y-%m-%d %H:%M"));
    }
    if let Some(deadline) = activity.estimate_deadline {
        println!("Estimate:   {}", deadline.format("%Y-%m-%d %H:%M"));
    }
    if !activity.comment.is_empty() {
        println!("Comment:    {}", activity.comment.replace('\n', "\n            "));
    }
}

fn print_job(job: &Job) {
    println!("Name:        {}", job.name);
    println!("Created:     {}", job.created_at);
    println!("Title:       {}", job.template.title);
    println!("Project:     {}", job.template.project);
    println!("Task:        {}", job.template.task);
    println!("Description: {}", job.template.description);
    if job.entries.is_empty() {
        return;
    }
    println!("---");
    for entry in &job.entries {
        println!(
            "{} - {}  {}",
            entry.start.format("%Y-%m-%d %H:%M"),
            entry.end.format("%H:%M"),
            entry.comment.replace('\n', " / ")
        );
    }
}
