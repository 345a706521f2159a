// CLI commands for talking to the execution service
use anyhow::{bail, Context, Result};
use labexec_client::{
    grade, reconcile, CancellationToken, CodeExecution, ExecuteOverrides, ExecutionResult,
    ExecutionSnapshot, ExecutionState, ExecutorClient, Grade, JobId, JobStatus, Verdict,
};
use labexec_common::types::{ExecutionRequest, TestCase};
use labexec_common::validate::validate_request;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Widest slice of stdout shown in the results table
const OUTPUT_PREVIEW_CHARS: usize = 40;

/// Check executor health
pub async fn health(client: &ExecutorClient) -> Result<()> {
    println!("🔍 Checking executor at {}", client.base_url());

    if client.health_check().await {
        println!("✅ Executor is healthy");
        Ok(())
    } else {
        bail!("Executor at {} is not healthy", client.base_url());
    }
}

/// List supported languages
pub async fn languages(client: &ExecutorClient) -> Result<()> {
    let languages = client
        .languages()
        .await
        .context("Failed to fetch supported languages")?;

    println!("📚 {} language(s) available:", languages.len());
    for language in &languages {
        println!("   {:<12} {}", language.language, language.display_name);
    }

    Ok(())
}

/// Build a request from a source file and an optional JSON test file
pub fn load_request(
    language: &str,
    file: &Path,
    tests: Option<&Path>,
) -> Result<ExecutionRequest> {
    let source_code = fs::read_to_string(file)
        .with_context(|| format!("Failed to read source file {}", file.display()))?;

    let test_cases = match tests {
        Some(path) => load_test_cases(path)?,
        None => Vec::new(),
    };

    let request = ExecutionRequest::new(language, source_code, test_cases);
    validate_request(&request, None).context("Invalid execution request")?;

    Ok(request)
}

/// Load test cases: `[{"id": 1, "input": "2", "expected": "4"}, ...]`
fn load_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read test file {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse test file {}", path.display()))
}

/// Submit without waiting
pub async fn submit(client: &ExecutorClient, request: &ExecutionRequest) -> Result<()> {
    let job_id = client
        .submit_job(request, &CancellationToken::new())
        .await
        .context("Failed to submit job")?;

    info!(job_id = %job_id, language = %request.language, "Job submitted");
    println!("🚀 Job submitted: {}", job_id);
    println!("   Check progress with: labexec status --id {}", job_id);

    Ok(())
}

/// One status read
pub async fn status(client: &ExecutorClient, id: u64) -> Result<()> {
    let status = client
        .get_job_status(JobId(id), &CancellationToken::new())
        .await
        .with_context(|| format!("Failed to fetch status of job {}", id))?;

    match status {
        JobStatus::Queued => println!("⏳ Job {} is queued", id),
        JobStatus::Running => println!("⚙️  Job {} is running", id),
        JobStatus::Completed { result } => {
            println!("✅ Job {} completed", id);
            print_results(&result);
        }
        JobStatus::Error { error } => println!("❌ Job {} failed: {}", id, error),
    }

    Ok(())
}

/// Submit, follow the job until it settles, then grade it
pub async fn run(
    client: Arc<ExecutorClient>,
    request: ExecutionRequest,
    marks: u32,
    overrides: ExecuteOverrides,
) -> Result<()> {
    match client.languages().await {
        Ok(languages) => validate_request(&request, Some(languages.as_slice()))
            .context("Language check against the executor failed")?,
        Err(e) => warn!(error = %e, "Could not fetch languages, skipping language check"),
    }

    let execution = Arc::new(CodeExecution::new(client));

    let mut updates = execution.subscribe();
    let printer = tokio::spawn(async move {
        let mut last = ExecutionState::Idle;
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            if snapshot.state != last {
                print_transition(&snapshot);
                last = snapshot.state;
            }
        }
    });

    let outcome = tokio::select! {
        outcome = execution.execute_with(&request, overrides) => Some(outcome),
        _ = signal::ctrl_c() => {
            warn!("Received interrupt, cancelling execution");
            execution.cancel();
            None
        }
    };

    // Closing the channel lets the printer drain and exit
    drop(execution);
    let _ = printer.await;

    let result = match outcome {
        None => {
            println!("🛑 Execution cancelled");
            return Ok(());
        }
        Some(Err(e)) if e.is_abort() => {
            println!("🛑 Execution cancelled");
            return Ok(());
        }
        Some(Err(e)) => {
            let kind = e.kind();
            return Err(anyhow::Error::new(e).context(format!("Execution failed [{}]", kind)));
        }
        Some(Ok(result)) => result,
    };

    if !result.compiled {
        println!("\n❌ Program did not compile");
        if let Some(message) = &result.message {
            println!("{}", message);
        }
        print_grade(&Grade {
            tests_passed: 0,
            total_tests: request.test_cases.len(),
            score: 0,
            max_score: marks,
            verdict: Verdict::Rejected,
        });
        return Ok(());
    }

    let reconciled = reconcile(&request, &result)
        .context("Executor returned results that do not match the submitted tests")?;
    print_results(&reconciled);
    print_grade(&grade(&reconciled, marks));

    Ok(())
}

fn print_transition(snapshot: &ExecutionSnapshot) {
    match snapshot.state {
        ExecutionState::Idle => {}
        ExecutionState::Submitting => {
            if let Some(run_id) = snapshot.run_id {
                println!("📤 Submitting (run {})", run_id);
            }
        }
        ExecutionState::Polling => {
            if let Some(job_id) = snapshot.job_id {
                println!("⏳ Job {} accepted, waiting for results...", job_id);
            }
        }
        ExecutionState::Completed => {
            let elapsed = match (snapshot.started_at, snapshot.finished_at) {
                (Some(start), Some(end)) => (end - start).num_milliseconds(),
                _ => 0,
            };
            println!("✅ Finished in {}ms", elapsed);
        }
        ExecutionState::Error => {
            if let Some(error) = &snapshot.error {
                println!("❌ {} [{}]", error.message, error.kind);
            }
        }
    }
}

fn print_results(result: &ExecutionResult) {
    println!(
        "\n📋 Results: {}/{} passed, {}ms total",
        result.passed_count(),
        result.results.len(),
        result.total_duration_ms
    );
    println!(
        "   {:<6} {:<7} {:<9} {:>8}  {}",
        "TEST", "PASSED", "RUN", "TIME", "OUTPUT"
    );

    for test in &result.results {
        let run = if test.timed_out {
            "timeout"
        } else if test.ok {
            "ok"
        } else {
            "crashed"
        };
        println!(
            "   {:<6} {:<7} {:<9} {:>6}ms  {}",
            test.id,
            if test.passed { "✅" } else { "❌" },
            run,
            test.duration_ms,
            preview(&test.stdout)
        );
        if !test.ok && !test.stderr.trim().is_empty() {
            println!("          stderr: {}", preview(&test.stderr));
        }
    }

    if let Some(message) = &result.message {
        println!("   {}", message);
    }
}

fn print_grade(grade: &Grade) {
    let verdict = match grade.verdict {
        Verdict::Accepted => "🏁 Accepted",
        Verdict::Rejected => "🚫 Rejected",
    };
    println!(
        "\n{}: {}/{} tests, score {}/{}",
        verdict, grade.tests_passed, grade.total_tests, grade.score, grade.max_score
    );
}

/// First line of `text`, cut to the preview width
fn preview(text: &str) -> String {
    let line = text.trim().lines().next().unwrap_or("");
    if line.chars().count() > OUTPUT_PREVIEW_CHARS {
        let cut: String = line.chars().take(OUTPUT_PREVIEW_CHARS).collect();
        format!("{}…", cut)
    } else {
        line.to_string()
    }
}
