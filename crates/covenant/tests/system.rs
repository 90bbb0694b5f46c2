use covenant::{
    ConstraintData, ConstraintSystem, ConstraintSystemPlugin, Error, EvaluationFilter,
    PluginHost, Value,
};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Model {
    time: String,
    max_length: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct State {
    current_time: String,
}

fn constraint_data() -> Vec<ConstraintData> {
    vec![
        serde_json::from_value(json!({
            "constraint":
                "ALWAYS: LENGTH($time) && LENGTH(#currentTime) && LENGTH('Test') < $maxLength",
            "message": "failed0",
            "id": 0,
        }))
        .unwrap(),
        serde_json::from_value(json!({
            "constraint":
                "WHEN(LENGTH('Test') == 4): LENGTH($time) - LENGTH(#currentTime) == ZERO",
            "message": "failed1",
            "id": 1,
        }))
        .unwrap(),
        serde_json::from_value(json!({
            "constraint": "ALWAYS: $time == '5:00'",
            "message": "failed2",
            "id": 2,
        }))
        .unwrap(),
    ]
}

struct TimePlugin;

impl ConstraintSystemPlugin<Model, State> for TimePlugin {
    async fn register_functions(
        &self,
        system: &mut ConstraintSystem<Model, State>,
    ) -> Result<(), Error> {
        system.add_function("LENGTH", |args: &[Value]| {
            Value::Number(args[0].to_string().chars().count() as f64)
        })?;
        system.add_statement("ZERO", |_, _| Value::Number(0.0))?;
        Ok(())
    }

    async fn register_constraints(
        &self,
        system: &mut ConstraintSystem<Model, State>,
    ) -> Result<(), Error> {
        system.add_constraints(constraint_data())
    }
}

fn test_model() -> Model {
    Model {
        time: "5:00".to_string(),
        max_length: 4,
    }
}

fn test_state() -> State {
    State {
        current_time: "7:00".to_string(),
    }
}

#[tokio::test]
async fn plugin_registration_and_filtered_evaluation() {
    let mut host: PluginHost<Model, State> = PluginHost::new();
    host.init(&TimePlugin).await.unwrap();

    let models = [test_model()];
    let state = test_state();

    let inconsistent = host
        .evaluate(&models, &state, &EvaluationFilter::Inconsistent)
        .unwrap();
    let consistent = host
        .evaluate(&models, &state, &EvaluationFilter::Consistent)
        .unwrap();
    let all = host.evaluate(&models, &state, &EvaluationFilter::All).unwrap();
    let by_id = host
        .evaluate(
            &models,
            &state,
            &EvaluationFilter::Resource(Box::new(|resource| resource.extra["id"] == json!(0))),
        )
        .unwrap();

    assert_eq!(inconsistent[0].evaluation.len(), 1);
    assert_eq!(consistent[0].evaluation.len(), 2);
    assert_eq!(all[0].evaluation.len(), 3);
    assert_eq!(by_id[0].evaluation.len(), 1);

    let report = &inconsistent[0];
    assert_eq!(report.checked_model, &models[0]);
    assert_eq!(report.checked_state, &state);
    assert_eq!(report.checked_constraints, constraint_data());
    assert_eq!(report.evaluation[0].message, "failed0");
    assert!(!report.evaluation[0].consistent);
}

#[tokio::test]
async fn duplicate_statement_registration_fails() {
    let mut system: ConstraintSystem<Model, State> = ConstraintSystem::new();
    system
        .add_statement("ZERO", |_, _| Value::Number(0.0))
        .unwrap();
    let err = system
        .add_statement("ZERO", |_, _| Value::Number(0.0))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateFunction(_)));
}

#[test]
fn ad_hoc_messages_interpolate_with_registered_functions() {
    let mut system: ConstraintSystem<Model, State> = ConstraintSystem::new();
    system
        .add_function("LENGTH", |args: &[Value]| {
            Value::Number(args[0].to_string().chars().count() as f64)
        })
        .unwrap();
    system
        .add_statement("ZERO", |_, _| Value::Number(0.0))
        .unwrap();

    let model = Model {
        time: "1:00".to_string(),
        max_length: 10,
    };
    let state = State {
        current_time: "4:00".to_string(),
    };

    let cases = [
        ("ZERO", "0"),
        ("$time", "1:00"),
        ("#currentTime", "4:00"),
        ("Length is LENGTH($time), is it?", "Length is 4, is it?"),
        ("Length is LENGTH('Four'), is it?", "Length is 4, is it?"),
        ("Length is 4.5, is it?", "Length is 4.5, is it?"),
    ];
    for (template, expected) in cases {
        assert_eq!(
            system.get_message(template, &model, &state).unwrap(),
            expected,
            "for {template:?}"
        );
    }
}

#[test]
fn empty_constraint_source_is_rejected_at_registration() {
    let mut system: ConstraintSystem<Model, State> = ConstraintSystem::new();
    let err = system.add_constraint(ConstraintData::new("")).unwrap_err();
    assert!(matches!(err, Error::Syntax(_)));
}

#[test]
fn unregistered_function_is_inconsistent_not_fatal() {
    let mut system: ConstraintSystem<serde_json::Value, serde_json::Value> =
        ConstraintSystem::new();
    system
        .add_constraint(ConstraintData::new("ALWAYS: myUnregisteredFunc() == 9"))
        .unwrap();
    let model = json!({});
    let state = json!({});
    let report = system
        .evaluate_one(&model, &state, &EvaluationFilter::All)
        .unwrap();
    assert_eq!(report.evaluation.len(), 1);
    assert!(!report.evaluation[0].consistent);
}

#[test]
fn multi_model_evaluation_yields_one_report_per_model() {
    let mut system: ConstraintSystem<serde_json::Value, serde_json::Value> =
        ConstraintSystem::new();
    system
        .add_constraint(ConstraintData::with_message("ALWAYS: $x > #limit", "over"))
        .unwrap();
    system
        .add_constraint(ConstraintData::new("ALWAYS: $x == $x"))
        .unwrap();

    let models = [json!({"x": 1}), json!({"x": 2})];
    let state = json!({"limit": 10});
    let reports = system
        .evaluate(&models, &state, &EvaluationFilter::Inconsistent)
        .unwrap();
    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert_eq!(report.evaluation.len(), 1);
        assert_eq!(report.evaluation[0].message, "over");
    }
}

#[test]
fn statistics_bucket_variable_occurrences_by_outcome() {
    let mut system: ConstraintSystem<serde_json::Value, serde_json::Value> =
        ConstraintSystem::new();
    system
        .add_constraints([
            ConstraintData::new("ALWAYS: $x > $y"),
            ConstraintData::new("WHEN $x > $y: $y * $y == #z"),
            ConstraintData::new("ALWAYS: #z == 5"),
        ])
        .unwrap();

    let stats = system
        .evaluate_statistics(&json!({"x": 4, "y": 2}), &json!({"z": 5}))
        .unwrap();
    assert_eq!(stats.total_constraints, 3);
    // "$x > $y" holds and "#z == 5" holds; the WHEN constraint asserts
    // 2 * 2 == 5 and fails.
    assert_eq!(stats.consistent.total, 2);
    assert_eq!(stats.inconsistent.total, 1);
    assert_eq!(stats.consistent.model.get("x"), Some(&1));
    assert_eq!(stats.consistent.state.get("z"), Some(&1));
    assert_eq!(stats.inconsistent.model.get("y"), Some(&3));
    assert_eq!(stats.inconsistent.state.get("z"), Some(&1));
}

#[test]
fn consistency_tallies_re_evaluate_every_call() {
    let mut system: ConstraintSystem<serde_json::Value, serde_json::Value> =
        ConstraintSystem::new();
    system
        .add_constraints([
            ConstraintData::new("ALWAYS: $x > 0"),
            ConstraintData::new("ALWAYS: $x > 10"),
        ])
        .unwrap();
    assert_eq!(system.num_constraints(), 2);

    let state = json!({});
    assert_eq!(
        system.num_consistent_constraints(&json!({"x": 5}), &state).unwrap(),
        1
    );
    assert_eq!(
        system.num_inconsistent_constraints(&json!({"x": 5}), &state).unwrap(),
        1
    );
    assert_eq!(
        system.num_consistent_constraints(&json!({"x": 20}), &state).unwrap(),
        2
    );
}

#[test]
fn functions_added_after_evaluation_are_picked_up() {
    let mut system: ConstraintSystem<serde_json::Value, serde_json::Value> =
        ConstraintSystem::new();
    system
        .add_constraint(ConstraintData::with_message(
            "ALWAYS: 1 > 2",
            "Length is LENGTH($time), is it?",
        ))
        .unwrap();

    let model = json!({"time": "5:00"});
    let state = json!({});
    let before = system
        .evaluate_one(&model, &state, &EvaluationFilter::All)
        .unwrap();
    assert_eq!(before.evaluation[0].message, "Length is LENGTH(5:00), is it?");

    system
        .add_function("LENGTH", |args: &[Value]| {
            Value::Number(args[0].to_string().chars().count() as f64)
        })
        .unwrap();
    let after = system
        .evaluate_one(&model, &state, &EvaluationFilter::All)
        .unwrap();
    assert_eq!(after.evaluation[0].message, "Length is 4, is it?");
}
