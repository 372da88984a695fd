//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::Config;
use serde_json::json;
use std::path::{Path, PathBuf};
use stepwise_core::formats::{document_from_value, document_to_process, document_version};
use stepwise_core::kinds::{Delay, EmitSignal, ExecuteChapters, SignalCondition, Timeout};
use stepwise_core::primitives::{MAX_DOCUMENT_SIZE, SERIALIZER_VERSION};
use stepwise_core::{
    Behavior, BehaviorData, Chapter, ChapterData, Condition, ConditionData, FileProcessStore, Guid,
    KindRegistry, Process, ProcessData, ProcessMetrics, RunOutcome, Runner, Severity, Step,
    StepData, StepwiseError, StorageStrategy, Transition, TransitionData, TypeRule,
    process_to_string, validate_process, walk_chapters,
};

/// Output switches shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
    pub verbose: bool,
}

// =============================================================================
// FILE VALIDATION
// =============================================================================

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: usize) -> Result<(), StepwiseError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| StepwiseError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size as u64 {
        return Err(StepwiseError::DeserializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, StepwiseError> {
    let canonical = path.canonicalize().map_err(|e| {
        StepwiseError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(StepwiseError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path: the parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, StepwiseError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        StepwiseError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(StepwiseError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| StepwiseError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Write the sample process under `name`.
pub fn cmd_init(config: &Config, output: Output, name: &str, force: bool) -> Result<PathBuf, StepwiseError> {
    let store = open_store(config)?;
    if store.exists(name) && !force {
        return Err(StepwiseError::IoError(format!(
            "Process '{}' already exists. Use --force to overwrite.",
            name
        )));
    }

    let path = store.save(&sample_process(name), config.storage)?;
    tracing::info!(process = name, path = %path.display(), "sample process written");

    if output.json {
        print_json(&json!({
            "process": name,
            "path": path.to_string_lossy(),
            "storage": config.storage.as_str(),
        }));
    } else {
        println!("Initialized process '{}' at {:?} ({})", name, path, config.storage);
    }
    Ok(path)
}

/// A two-chapter sample: a briefing that loops back on demand, with a
/// nested checklist, followed by a wrap-up.
///
/// ```text
/// Briefing:  Welcome -> Inspect --retry--> Welcome
///                          \--done (500 ms)--> end of chapter
/// Wrap-up:   Goodbye
/// ```
#[must_use]
pub fn sample_process(name: &str) -> Process {
    let welcome = Guid::new();
    let inspect = Guid::new();

    let checklist = Chapter::new(
        "Checklist",
        ChapterData::new(Guid::new()).with_step(Step::new(
            "Check gloves",
            StepData::new(Guid::new()).with_description("Confirm gloves are worn"),
        )),
    );

    let briefing = ChapterData::new(Guid::new())
        .with_step(Step::new(
            "Welcome",
            StepData::new(welcome)
                .with_description("Greet the trainee")
                .with_behavior(Behavior::new("greet", BehaviorData::new(EmitSignal::new("welcomed"))))
                .with_transition(Transition::new(
                    "continue",
                    TransitionData::to(inspect).with_condition(Condition::new(
                        "welcomed",
                        ConditionData::new(SignalCondition::new("welcomed")),
                    )),
                )),
        ))
        .with_step(Step::new(
            "Inspect",
            StepData::new(inspect)
                .with_description("Walk through the equipment")
                .with_behavior(Behavior::new("pause", BehaviorData::new(Delay::new(300))))
                .with_behavior(Behavior::new(
                    "checklist",
                    BehaviorData::new(ExecuteChapters::new()).with_chapters(vec![checklist]),
                ))
                .with_transition(Transition::new(
                    "retry",
                    TransitionData::to(welcome).with_condition(Condition::new(
                        "retry requested",
                        ConditionData::new(SignalCondition::new("retry").mandatory().consuming()),
                    )),
                ))
                .with_transition(Transition::new(
                    "done",
                    TransitionData::new(None)
                        .with_condition(Condition::new("settle", ConditionData::new(Timeout::new(500)))),
                )),
        ));

    let wrap_up = ChapterData::new(Guid::new()).with_step(Step::new(
        "Goodbye",
        StepData::new(Guid::new()).with_description("Thank the trainee"),
    ));

    Process::new(
        name,
        ProcessData::new()
            .with_chapter(Chapter::new("Briefing", briefing))
            .with_chapter(Chapter::new("Wrap-up", wrap_up)),
    )
}

// =============================================================================
// LIST COMMAND
// =============================================================================

/// List stored processes.
pub fn cmd_list(config: &Config, output: Output) -> Result<Vec<String>, StepwiseError> {
    let store = open_store(config)?;
    let names = store.list()?;

    if output.json {
        print_json(&json!({
            "store": store.root().to_string_lossy(),
            "processes": names,
        }));
        return Ok(names);
    }

    println!("Processes in {:?}", store.root());
    if names.is_empty() {
        println!("  (none)");
    }
    for name in &names {
        println!("  {}", name);
    }
    Ok(names)
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

/// Show metrics and validation issues.
pub fn cmd_inspect(
    config: &Config,
    output: Output,
    name: &str,
    detailed: bool,
) -> Result<ProcessMetrics, StepwiseError> {
    let store = open_store(config)?;
    let process = store.load(name, &KindRegistry::default())?;
    let metrics = ProcessMetrics::from_process(&process);
    let issues = validate_process(&process);

    if output.json {
        print_json(&json!({
            "process": process.name(),
            "metrics": metrics,
            "has_loops": metrics.has_loops(),
            "issues": issues,
        }));
        return Ok(metrics);
    }

    println!("Process: {}", process.name());
    println!("=========");
    println!("Chapters:     {} ({} nested)", metrics.chapter_count, metrics.nested_chapter_count);
    println!("Steps:        {}", metrics.step_count);
    println!("Behaviors:    {}", metrics.behavior_count);
    println!("Transitions:  {}", metrics.transition_count);
    println!("Conditions:   {}", metrics.condition_count);
    println!("Max Depth:    {}", metrics.max_depth);
    println!("Loops:        {}", metrics.back_edge_count);

    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
    println!();
    println!("Issues: {} ({} errors)", issues.len(), errors);
    for issue in &issues {
        println!("  {}", issue);
    }

    if detailed {
        println!();
        print_tree(&process);
    }

    Ok(metrics)
}

fn print_tree(process: &Process) {
    walk_chapters(process, |chapter, depth| {
        let indent = "  ".repeat(depth * 2);
        println!("{}[{}]", indent, chapter.name());
        for step in chapter.data().steps() {
            let marker = if chapter.data().first_step() == Some(step.data().id()) {
                "*"
            } else {
                " "
            };
            println!("{}  {} {}", indent, marker, step.name());
            for behavior in step.data().behaviors() {
                println!("{}      + {} ({})", indent, behavior.name(), behavior.data().kind().type_name());
            }
            for transition in step.data().transitions() {
                let target = transition
                    .data()
                    .target()
                    .and_then(|id| chapter.data().step(id))
                    .map_or("(end)", |s| s.name());
                let conditions: Vec<&str> = transition
                    .data()
                    .conditions()
                    .iter()
                    .map(|c| c.data().kind().type_name())
                    .collect();
                println!(
                    "{}      -> {} [{}] when {:?}",
                    indent,
                    target,
                    transition.name(),
                    conditions
                );
            }
        }
    });
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Execute a process to completion, or until the tick budget runs out.
pub fn cmd_run(
    config: &Config,
    output: Output,
    name: &str,
    signals: &[String],
    fast_forward: bool,
) -> Result<RunOutcome, StepwiseError> {
    let store = open_store(config)?;
    let process = store.load(name, &KindRegistry::default())?;
    let mut runner = Runner::with_modes(process, config.mode_collection()?);
    for signal in signals {
        runner.raise_signal(signal.clone());
    }

    let outcome = if fast_forward {
        runner.fast_forward()?;
        runner.outcome()
    } else {
        runner.run_until_complete(config.tick(), config.max_ticks)?
    };
    let status = runner.status();

    if output.json {
        print_json(&json!({
            "outcome": outcome,
            "status": status,
        }));
        return Ok(outcome);
    }

    println!("Process:  {}", status.process);
    println!("Mode:     {}", status.mode);
    println!(
        "Result:   {}",
        if outcome.completed { "completed" } else { "incomplete" }
    );
    println!("Ticks:    {} ({} ms simulated)", outcome.ticks, outcome.elapsed_ms);
    println!("Visited:  {}", outcome.visited_steps.join(" -> "));
    if !outcome.completed {
        if let Some(step) = &status.step {
            println!("Waiting:  {}", step);
        }
    }
    for failure in &status.failures {
        println!("Failure:  {}", failure);
    }

    if output.verbose {
        println!();
        println!("Stage changes:");
        let evicted = runner.journal().evicted();
        if evicted > 0 {
            println!("  ({} earlier changes evicted)", evicted);
        }
        for change in runner.drain_journal() {
            println!("  {} '{}': {} -> {}", change.kind, change.name, change.from, change.to);
        }
    }

    Ok(outcome)
}

// =============================================================================
// MIGRATE COMMAND
// =============================================================================

/// Read a document of any supported version and write it at the current
/// version. Returns the version that was read.
pub fn cmd_migrate(output: Output, input: &Path, target: &Path) -> Result<u32, StepwiseError> {
    let validated_input = validate_file_path(input)?;
    validate_file_size(&validated_input, MAX_DOCUMENT_SIZE)?;
    let validated_output = validate_output_path(target)?;

    let text = std::fs::read_to_string(&validated_input)
        .map_err(|e| StepwiseError::IoError(format!("Read file: {}", e)))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| StepwiseError::DeserializationError(e.to_string()))?;
    let version = document_version(&value)?;

    // Resolving proves the migrated graph is whole before anything is written.
    let process = document_to_process(document_from_value(value)?, &KindRegistry::default())?;
    let data = process_to_string(&process)?;
    std::fs::write(&validated_output, &data)
        .map_err(|e| StepwiseError::IoError(format!("Write file: {}", e)))?;

    tracing::info!(from = version, to = SERIALIZER_VERSION, process = process.name(), "document migrated");

    if output.json {
        print_json(&json!({
            "process": process.name(),
            "from_version": version,
            "to_version": SERIALIZER_VERSION,
            "output": validated_output.to_string_lossy(),
        }));
    } else {
        println!(
            "Migrated '{}' from v{} to v{}: {} bytes written to {:?}",
            process.name(),
            version,
            SERIALIZER_VERSION,
            data.len(),
            validated_output
        );
    }
    Ok(version)
}

// =============================================================================
// CONVERT COMMAND
// =============================================================================

/// Re-save a stored process with another storage strategy.
pub fn cmd_convert(
    config: &Config,
    output: Output,
    name: &str,
    strategy: StorageStrategy,
) -> Result<PathBuf, StepwiseError> {
    let store = open_store(config)?;
    let process = store.load(name, &KindRegistry::default())?;
    let path = store.save_as(name, &process, strategy)?;

    if output.json {
        print_json(&json!({
            "process": process.name(),
            "path": path.to_string_lossy(),
            "storage": strategy.as_str(),
        }));
    } else {
        println!("Converted '{}' to {} at {:?}", process.name(), strategy, path);
    }
    Ok(path)
}

// =============================================================================
// MODES COMMAND
// =============================================================================

/// List configured modes; the selected one is starred.
pub fn cmd_modes(config: &Config, output: Output) -> Result<(), StepwiseError> {
    let modes = config.mode_collection()?;

    if output.json {
        print_json(&json!({
            "selected": modes.current().name(),
            "modes": modes.modes(),
        }));
        return Ok(());
    }

    for mode in modes.modes() {
        let marker = if mode.name() == modes.current().name() { "*" } else { " " };
        let (rule, types) = match mode.rule() {
            TypeRule::Whitelist(types) => ("whitelist", types),
            TypeRule::Blacklist(types) => ("blacklist", types),
        };
        let types: Vec<&str> = types.iter().map(String::as_str).collect();
        println!("{} {:<12} {} [{}]", marker, mode.name(), rule, types.join(", "));
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the configured process store.
pub fn open_store(config: &Config) -> Result<FileProcessStore, StepwiseError> {
    FileProcessStore::open(&config.store)
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}
