//! # Property-Based Tests
//!
//! Invariants checked over randomly generated step graphs and operation
//! sequences.

use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;
use std::time::Duration;
use stepwise_core::kinds::{Delay, ExecuteChapters, SignalCondition};
use stepwise_core::{
    Behavior, BehaviorData, Chapter, ChapterData, Condition, ConditionData, Context, Guid, Journal,
    KindRegistry, Mode, Process, ProcessData, Runner, Signals, Stage, Step, StepData,
    StepwiseError, Transition, TransitionData, TypeRule, process_from_str, process_to_string,
};

/// Build a single-chapter process. `targets[i]` lists the transition targets
/// of step `i`, as indices wrapped into range; every transition is gated by
/// a mandatory signal so nothing moves without help.
fn graph(targets: &[Vec<Option<usize>>]) -> Process {
    let count = targets.len();
    let mut chapter = ChapterData::new(Guid::from_u128(1_000));
    for (i, outgoing) in targets.iter().enumerate() {
        let mut data = StepData::new(Guid::from_u128(i as u128 + 1));
        for (j, target) in outgoing.iter().enumerate() {
            let target = target.map(|t| Guid::from_u128((t % count) as u128 + 1));
            data = data.with_transition(Transition::new(
                format!("t{}", j),
                TransitionData::new(target).with_condition(Condition::new(
                    "gate",
                    ConditionData::new(SignalCondition::new(format!("go-{}-{}", i, j)).mandatory()),
                )),
            ));
        }
        chapter.add_step(Step::new(format!("S{}", i), data));
    }
    Process::new("random", ProcessData::new().with_chapter(Chapter::new("Ch", chapter)))
}

/// One chapter of a generated process: transition targets per step, plus
/// sub-chapters attached to steps (step index wrapped into range).
#[derive(Debug, Clone)]
struct ChapterSpec {
    targets: Vec<Vec<Option<usize>>>,
    nested: Vec<(usize, ChapterSpec)>,
}

fn chapter_spec() -> impl Strategy<Value = ChapterSpec> {
    let leaf = small_targets().prop_map(|targets| ChapterSpec {
        targets,
        nested: Vec::new(),
    });
    leaf.prop_recursive(3, 24, 3, |inner| {
        (small_targets(), vec((0usize..8, inner), 0..3))
            .prop_map(|(targets, nested)| ChapterSpec { targets, nested })
    })
}

fn small_targets() -> impl Strategy<Value = Vec<Vec<Option<usize>>>> {
    vec(vec(option::of(0usize..8), 0..3), 1..5)
}

fn fresh(next_id: &mut u128) -> Guid {
    *next_id += 1;
    Guid::from_u128(*next_id)
}

/// Build a chapter tree from a spec. Step names carry the chapter path so
/// every step in the process is distinguishable.
fn build_chapter(spec: &ChapterSpec, name: String, next_id: &mut u128) -> Chapter {
    let count = spec.targets.len();
    let chapter_id = fresh(next_id);
    let ids: Vec<Guid> = (0..count).map(|_| fresh(next_id)).collect();

    let mut nested: Vec<Vec<Chapter>> = (0..count).map(|_| Vec::new()).collect();
    for (k, (at, sub)) in spec.nested.iter().enumerate() {
        nested[at % count].push(build_chapter(sub, format!("{}.{}", name, k), next_id));
    }

    let mut chapter = ChapterData::new(chapter_id);
    for (i, (outgoing, sub_chapters)) in spec.targets.iter().zip(nested).enumerate() {
        let mut data = StepData::new(ids[i]);
        if !sub_chapters.is_empty() {
            data = data.with_behavior(Behavior::new(
                "sub",
                BehaviorData::new(ExecuteChapters::new()).with_chapters(sub_chapters),
            ));
        }
        for (j, target) in outgoing.iter().enumerate() {
            data = data.with_transition(Transition::new(
                format!("t{}", j),
                TransitionData::new(target.map(|t| ids[t % count])).with_condition(Condition::new(
                    "gate",
                    ConditionData::new(
                        SignalCondition::new(format!("go-{}-{}-{}", name, i, j)).mandatory(),
                    ),
                )),
            ));
        }
        chapter.add_step(Step::new(format!("{}/S{}", name, i), data));
    }
    Chapter::new(name, chapter)
}

fn nested_graph(specs: &[ChapterSpec]) -> Process {
    let mut next_id = 0;
    let mut data = ProcessData::new();
    for (k, spec) in specs.iter().enumerate() {
        data = data.with_chapter(build_chapter(spec, format!("C{}", k), &mut next_id));
    }
    Process::new("nested", data)
}

#[derive(Debug, PartialEq)]
struct ChapterShape {
    name: String,
    first: Option<String>,
    steps: Vec<StepShape>,
}

#[derive(Debug, PartialEq)]
struct StepShape {
    name: String,
    targets: Vec<Option<String>>,
    nested: Vec<ChapterShape>,
}

/// Names, transition targets by name and sub-chapter nesting, with guids
/// left out.
fn chapter_shape(chapter: &Chapter) -> ChapterShape {
    let data = chapter.data();
    let name_of = |id: Guid| data.step(id).map(|s| s.name().to_string());
    ChapterShape {
        name: chapter.name().to_string(),
        first: data.first_step().and_then(name_of),
        steps: data
            .steps()
            .iter()
            .map(|step| StepShape {
                name: step.name().to_string(),
                targets: step
                    .data()
                    .transitions()
                    .iter()
                    .map(|t| t.data().target().and_then(name_of))
                    .collect(),
                nested: step
                    .data()
                    .behaviors()
                    .iter()
                    .flat_map(|b| b.data().chapters())
                    .map(chapter_shape)
                    .collect(),
            })
            .collect(),
    }
}

fn shape(process: &Process) -> Vec<ChapterShape> {
    process.data().chapters().iter().map(chapter_shape).collect()
}

fn targets() -> impl Strategy<Value = Vec<Vec<Option<usize>>>> {
    vec(vec(option::of(0usize..16), 0..4), 1..10)
}

#[derive(Debug, Clone)]
enum Op {
    Activate,
    Update,
    Deactivate,
    FastForward,
    FastForwardStage(Stage),
    Raise,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Activate),
        Just(Op::Update),
        Just(Op::Update),
        Just(Op::Deactivate),
        Just(Op::FastForward),
        prop::sample::select(Stage::ALL.to_vec()).prop_map(Op::FastForwardStage),
        Just(Op::Raise),
    ]
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Any graph, cycles and nested sub-chapters included, survives save
    /// and load, and the second save is byte-identical to the first.
    #[test]
    fn roundtrip_preserves_graph(specs in vec(chapter_spec(), 1..3)) {
        let original = nested_graph(&specs);
        let registry = KindRegistry::default();

        let text = process_to_string(&original).expect("save");
        let loaded = process_from_str(&text, &registry).expect("load");

        prop_assert_eq!(shape(&loaded), shape(&original));
        prop_assert_eq!(process_to_string(&loaded).expect("save again"), text);
    }

    /// Fast-forwarding any graph terminates with the process inactive.
    #[test]
    fn fast_forward_terminates(targets in targets()) {
        let mut runner = Runner::new(graph(&targets));
        runner.fast_forward().expect("fast-forward");

        prop_assert_eq!(runner.process().stage(), Stage::Inactive);
        prop_assert!(!runner.visited_steps().is_empty());
    }

    /// A transition completes exactly when every condition is either
    /// satisfied or optional and skipped by the mode.
    #[test]
    fn transition_completion_law(
        conditions in vec((any::<bool>(), any::<bool>()), 0..5),
        skip in any::<bool>(),
    ) {
        let mode = if skip {
            Mode::new("Skip", TypeRule::blacklist(["signal"]))
        } else {
            Mode::default()
        };
        let mut signals = Signals::new();
        let mut journal = Journal::new();

        let mut data = TransitionData::new(None);
        for (i, (optional, raised)) in conditions.iter().enumerate() {
            let name = format!("c{}", i);
            let mut kind = SignalCondition::new(name.clone());
            if !optional {
                kind = kind.mandatory();
            }
            if *raised {
                signals.raise(name.clone());
            }
            data = data.with_condition(Condition::new(name, ConditionData::new(kind)));
        }
        let mut transition = Transition::new("t", data);

        let mut ctx = Context::new(&mode, Duration::from_millis(100), &mut signals, &mut journal);
        transition.activate(&mut ctx).expect("activate");
        for _ in 0..4 {
            transition.update(&mut ctx).expect("update");
        }

        let expected = conditions
            .iter()
            .all(|(optional, raised)| *raised || (*optional && skip));
        prop_assert_eq!(transition.data().is_completed(), expected);
        prop_assert_eq!(transition.stage() == Stage::Active, expected);
    }

    /// Whatever operations a driver issues, every recorded stage change is
    /// legal and rejected operations leave the stage untouched.
    #[test]
    fn operations_keep_stage_changes_legal(ops in vec(op(), 0..40)) {
        let mode = Mode::default();
        let mut signals = Signals::new();
        let mut journal = Journal::new();
        let mut step = Step::new(
            "S",
            StepData::new(Guid::from_u128(1))
                .with_behavior(Behavior::new("pause", BehaviorData::new(Delay::new(200))))
                .with_transition(Transition::new(
                    "t",
                    TransitionData::new(None).with_condition(Condition::new(
                        "c",
                        ConditionData::new(SignalCondition::new("go").consuming()),
                    )),
                )),
        );

        for op in ops {
            let mut ctx = Context::new(&mode, Duration::from_millis(100), &mut signals, &mut journal);
            let before = step.stage();
            let result = match op {
                Op::Activate => step.activate(&mut ctx),
                Op::Update => step.update(&mut ctx),
                Op::Deactivate => step.deactivate(&mut ctx),
                Op::FastForward => step.mark_to_fast_forward(&mut ctx),
                Op::FastForwardStage(stage) => step.mark_to_fast_forward_stage(stage, &mut ctx),
                Op::Raise => {
                    ctx.signals.raise("go");
                    Ok(())
                }
            };
            if let Err(error) = result {
                prop_assert!(
                    matches!(error, StepwiseError::InvalidState { .. }),
                    "unexpected error: {}",
                    error
                );
                prop_assert_eq!(step.stage(), before);
            }
        }

        for change in journal.changes() {
            prop_assert!(change.from.can_transition_to(change.to), "illegal change {:?}", change);
        }
    }
}
