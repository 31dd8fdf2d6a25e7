use adaptive_quiz::analytics::analyze;
use adaptive_quiz::selector::{build_pools, PoolKind};
use adaptive_quiz::{
    record_answer, select_next, submit_answer, AnswerEvent, ConceptKey, CoreError, Course,
    Difficulty, Performance, Policy, RecentHistory,
};
use rand::rngs::mock::StepRng;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn course() -> Course {
    Course::from_json_str(
        r#"{
            "title": "Intro to Python",
            "description": "First steps",
            "topics": [
                {
                    "name": "Python",
                    "description": "The language",
                    "subtopics": [
                        {
                            "name": "Control Flow",
                            "description": "Branching and iteration",
                            "concepts": [
                                {"name": "Loops", "description": "for and while", "keywords": ["for", "while"]},
                                {"name": "Conditionals", "description": "if and else", "keywords": ["if"]}
                            ]
                        },
                        {
                            "name": "Functions",
                            "description": "Reusable code",
                            "concepts": [
                                {"name": "Arguments", "description": "Passing values"},
                                {"name": "Recursion", "description": "Self calls"},
                                {"name": "Closures", "description": "Captured state"}
                            ]
                        }
                    ]
                }
            ]
        }"#,
    )
    .unwrap()
}

#[test]
fn three_misses_on_loops_make_it_weak() {
    let policy = Policy::default();
    let mut performance = Performance::default();
    for _ in 0..3 {
        performance = record_answer(performance, "Python", "Control Flow", "Loops", false, &policy);
    }

    assert_eq!(performance.trophy_score, 0);
    let loops = ConceptKey::new("Python", "Control Flow", "Loops");
    let score = performance.concept_score(&loops).unwrap();
    assert_eq!(score.accuracy(), 0.0);
    assert!(score.is_weak(&policy));

    let course = course();
    let insights = analyze(&performance, &policy);
    let pools = build_pools(&performance, &insights, &course, &RecentHistory::new(), &policy);
    assert!(pools.weak.contains(&loops));

    let selection = select_next(
        &performance,
        &insights,
        &course,
        &RecentHistory::new(),
        &policy,
        &mut StepRng::new(0, 0),
    )
    .unwrap();
    assert_eq!(selection.pool, PoolKind::Weak);
    assert_eq!(selection.key, loops);
    assert_eq!(selection.difficulty, Difficulty::Easy);
}

#[test]
fn alternating_answers_across_five_concepts_give_half_accuracy() {
    let policy = Policy::default();
    let concepts = [
        ("Control Flow", "Loops"),
        ("Control Flow", "Conditionals"),
        ("Functions", "Arguments"),
        ("Functions", "Recursion"),
        ("Functions", "Closures"),
    ];

    let mut performance = Performance::default();
    for i in 0..10 {
        let (subtopic, concept) = concepts[i % concepts.len()];
        performance = record_answer(performance, "Python", subtopic, concept, i % 2 == 0, &policy);
    }

    assert_eq!(performance.total_questions_answered, 10);
    assert!((performance.overall_accuracy - 0.5).abs() < 1e-12);
    assert_eq!(performance.trophy_score, 25);
}

#[test]
fn no_weak_or_priority_still_selects() {
    let policy = Policy::default();
    let course = course();
    let performance = Performance::default();
    let insights = analyze(&performance, &policy);

    for seed in 0..20 {
        let selection = select_next(
            &performance,
            &insights,
            &course,
            &RecentHistory::new(),
            &policy,
            &mut StdRng::seed_from_u64(seed),
        )
        .unwrap();
        assert_eq!(selection.pool, PoolKind::Exploration);
        assert!(course.find(&selection.key).is_some());
    }
}

#[test]
fn empty_catalog_fails_selection_and_turns() {
    let policy = Policy::default();
    let empty = Course::from_json_str(r#"{"title": "Nothing", "topics": []}"#).unwrap();
    let performance = Performance::default();
    let insights = analyze(&performance, &policy);

    let err = select_next(
        &performance,
        &insights,
        &empty,
        &RecentHistory::new(),
        &policy,
        &mut StepRng::new(0, 0),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::EmptyCatalog));

    let answer = AnswerEvent::new("Python", "Control Flow", "Loops", true);
    let err = submit_answer(
        performance,
        &empty,
        RecentHistory::new(),
        &answer,
        &policy,
        &mut StepRng::new(0, 0),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::EmptyCatalog));
}

#[test]
fn overridden_thresholds_change_weakness() {
    let policy = Policy::from_toml_str("weak_threshold = 0.7\nmastery_threshold = 0.9\n").unwrap();
    let mut performance = Performance::default();
    for is_correct in [true, true, true, false, false] {
        performance = record_answer(performance, "Python", "Functions", "Recursion", is_correct, &policy);
    }

    let insights = analyze(&performance, &policy);
    assert_eq!(insights.weak_areas.len(), 1);
    assert!(analyze(&performance, &Policy::default()).weak_areas.is_empty());
}

#[test]
fn a_session_of_turns_keeps_totals_consistent() {
    let policy = Policy::default();
    let course = course();
    let mut rng = StdRng::seed_from_u64(42);
    let mut performance = Performance::default();
    let mut history = RecentHistory::new();
    let mut next = AnswerEvent::new("Python", "Control Flow", "Loops", false);

    for turn in 0..30 {
        let outcome = submit_answer(performance, &course, history, &next, &policy, &mut rng).unwrap();
        assert!(outcome.history.len() <= policy.history_window);
        assert!(!outcome.history.contains(&outcome.selection.key) || outcome.selection.pool == PoolKind::Catalog);

        performance = outcome.performance;
        history = outcome.history;
        let key = outcome.selection.key;
        next = AnswerEvent::new(key.topic, key.subtopic, key.concept, turn % 3 == 0);
    }

    assert_eq!(performance.total_questions_answered, 30);
    assert_eq!(
        performance.total_questions_answered,
        performance.total_correct + performance.total_incorrect
    );
}

#[test]
fn demo_inputs_replay_cleanly() {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
    let course = Course::load(&root.join("course.json")).unwrap();
    let policy = Policy::load(&root.join("policy.toml")).unwrap();
    let answers = adaptive_quiz::tracker::read_answer_log(&root.join("answers.csv")).unwrap();

    let performance = adaptive_quiz::tracker::replay(&answers, &policy);
    assert_eq!(performance.total_questions_answered, 8);
    assert_eq!(performance.total_correct, 5);
    assert_eq!(performance.trophy_score, 45);

    let insights = analyze(&performance, &policy);
    let weak: Vec<&str> = insights.weak_areas.iter().map(|a| a.key.concept.as_str()).collect();
    assert_eq!(weak, ["Loops"]);
    assert_eq!(course.concept_count(), 6);
}
