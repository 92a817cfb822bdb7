//! End-to-end template scenarios: parse once, execute with varied
//! parameter shapes, compare against canonical JSON.

use json_template::{parse, FuncDef, FuncError, Options, ParamKind, Value};
use serde_json::json;

fn run(source: &str, params: Value) -> Value {
    parse(Options::new(), source)
        .expect("template should compile")
        .execute(params)
        .expect("template should execute")
}

fn as_json(value: &Value) -> serde_json::Value {
    value.to_json().expect("result should have a JSON shape")
}

fn obj(entries: Vec<(&str, Value)>) -> Value {
    Value::Object(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

const COPY_X: &str = r#"
    result = ``{"x":null}``
    if args.x
        result.x = args.x
    end
"#;

#[test]
fn conditional_copy_with_null_params() {
    assert_eq!(as_json(&run(COPY_X, Value::Null)), json!({"x": null}));
}

#[test]
fn conditional_copy_with_raw_params() {
    let out = run(COPY_X, Value::raw(r#"{"x":[1,2,3]}"#));
    assert_eq!(as_json(&out), json!({"x": [1, 2, 3]}));
}

#[test]
fn conditional_copy_with_object_params() {
    let out = run(COPY_X, Value::from(json!({"x": "y"})));
    assert_eq!(as_json(&out), json!({"x": "y"}));
}

#[test]
fn plain_string_params_have_no_fields() {
    // A string parameter is not JSON text; looking up `.x` in it is null.
    let out = run(COPY_X, Value::from(r#"{"x":2}"#));
    assert_eq!(as_json(&out), json!({"x": null}));
}

#[test]
fn serialized_host_values_work_as_params() {
    #[derive(serde::Serialize)]
    struct Args {
        x: i32,
    }
    let params = Value::from_serialize(&Args { x: 123 }).unwrap();
    assert_eq!(as_json(&run(COPY_X, params)), json!({"x": 123}));
}

#[test]
fn foreach_fills_object_and_array() {
    let options = Options::new().prototype(Value::from(json!({"obj": {}, "arr": []})));
    let template = parse(
        options,
        "for k v in args\n\tresult.obj[k]=v\n\tresult.arr[]=v\nend\n",
    )
    .unwrap();
    let out = template
        .execute(Value::from(json!({"k1": "v1", "k2": "v2"})))
        .unwrap();
    assert_eq!(
        as_json(&out),
        json!({"obj": {"k1": "v1", "k2": "v2"}, "arr": ["v1", "v2"]})
    );
}

const BOOL_FUNCS: &str = r#"
    if or(args.x, args.y)
        result.or = args.x
    end
    result.and = and(args.x, args.y)
    result.not = not(args.x)
"#;

#[test]
fn boolean_functions_with_both_args_set() {
    let out = run(BOOL_FUNCS, Value::from(json!({"x": 1, "y": "1"})));
    assert_eq!(
        as_json(&out),
        json!({"or": 1, "and": true, "not": false})
    );
}

#[test]
fn boolean_functions_with_empty_args() {
    let out = run(BOOL_FUNCS, Value::from(json!({"x": "", "y": false})));
    assert_eq!(as_json(&out), json!({"and": false, "not": true}));
}

#[test]
fn boolean_functions_write_null_for_missing_or_winner() {
    let out = run(BOOL_FUNCS, Value::from(json!({"y": 1})));
    assert_eq!(
        as_json(&out),
        json!({"or": null, "and": false, "not": true})
    );
}

const TRUTHY_GATE: &str = "result = 0 if args.x result = 1 end";

#[test]
fn truthiness_of_parameter_fields() {
    let cases: Vec<(Value, serde_json::Value)> = vec![
        (Value::Null, json!(0)),
        (Value::from(json!({"x": ""})), json!(0)),
        (Value::from(json!({"x": "xx"})), json!(1)),
        (Value::from(json!({"x": []})), json!(0)),
        (Value::from(json!({"x": [false]})), json!(1)),
        (obj(vec![("x", Value::raw(" [ ] "))]), json!(0)),
        (obj(vec![("x", Value::raw("[false]"))]), json!(1)),
    ];
    let template = parse(Options::new(), TRUTHY_GATE).unwrap();
    for (params, want) in cases {
        let out = template.execute(params.clone()).unwrap();
        assert_eq!(as_json(&out), want, "params {params:?}");
    }
}

#[test]
fn indexed_set_builds_an_array_from_nothing() {
    let out = run(r#"result[5] = "z""#, Value::Null);
    assert_eq!(
        as_json(&out),
        json!([null, null, null, null, null, "z"])
    );
}

#[test]
fn negative_index_counts_back_from_the_end() {
    let options = Options::new().prototype(Value::from(json!([1, 2, 3])));
    let template = parse(options, r#"result[-2] = "a""#).unwrap();
    let out = template.execute(Value::Null).unwrap();
    assert_eq!(as_json(&out), json!([1, "a", 3]));
}

#[test]
fn far_negative_index_prepends_nulls() {
    let options = Options::new().prototype(Value::from(json!([1, 2, 3])));
    let template = parse(options, r#"result[-10] = "a""#).unwrap();
    let out = template.execute(Value::Null).unwrap();
    assert_eq!(
        as_json(&out),
        json!(["a", null, null, null, null, null, null, 1, 2, 3])
    );
}

#[test]
fn condition_loop_counts_down() {
    let out = run(
        "i = 3\nfor i\n\tresult[] = i\n\ti = sum(i, -1)\nend\n",
        Value::Null,
    );
    assert_eq!(as_json(&out), json!([3, 2, 1]));
}

#[test]
fn foreach_keys_over_an_array_are_indices() {
    let out = run(
        "for k in args\n\tresult[k] = k\nend\n",
        Value::from(json!([10, 20])),
    );
    assert_eq!(as_json(&out), json!([0, 1]));
}

#[test]
fn deep_paths_create_every_missing_node() {
    let out = run("result.a.b[0].c = 1", Value::Null);
    assert_eq!(as_json(&out), json!({"a": {"b": [{"c": 1}]}}));
}

#[test]
fn eq_compares_across_shapes() {
    let source = r#"
        if eq(args.a, args.b)
            result = "same"
        else
            result = "diff"
        end
    "#;
    let out = run(source, Value::from(json!({"a": [1], "b": [1]})));
    assert_eq!(as_json(&out), json!("same"));
    let out = run(source, Value::from(json!({"a": 1, "b": 2})));
    assert_eq!(as_json(&out), json!("diff"));
}

#[test]
fn named_constants_read_like_variables() {
    let options = Options::new()
        .constant("greeting", Value::from("hi"))
        .unwrap();
    let template = parse(options, "result.msg = greeting").unwrap();
    let out = template.execute(Value::Null).unwrap();
    assert_eq!(as_json(&out), json!({"msg": "hi"}));
}

#[test]
fn user_functions_are_called_with_coerced_args() {
    let upper = FuncDef::new("upper", vec![ParamKind::Str], false, |args| {
        match &args[0] {
            Value::Str(s) => Ok(Value::Str(s.to_uppercase())),
            other => Err(FuncError::new(format!("want string, got {}", other.kind_name()))),
        }
    });
    let options = Options::new().func(upper).unwrap();
    let template = parse(options, "result = upper(args.name)").unwrap();
    let out = template.execute(Value::from(json!({"name": "world"}))).unwrap();
    assert_eq!(as_json(&out), json!("WORLD"));
}

#[test]
fn user_function_errors_surface_with_positions() {
    let fail = FuncDef::new("fail", vec![ParamKind::Any], false, |_| {
        Err(FuncError::new("db offline"))
    });
    let options = Options::new().func(fail).unwrap();
    let template = parse(options, "result = fail(1)").unwrap();
    let err = template.execute(Value::Null).unwrap_err();
    assert_eq!(err.to_string(), "[1:9] db offline");
}

#[test]
fn user_function_panics_become_runtime_errors() {
    let boom = FuncDef::new("boom", vec![ParamKind::Any], false, |_| panic!("boom"));
    let options = Options::new().func(boom).unwrap();
    let template = parse(options, "result = boom(1)").unwrap();
    let err = template.execute(Value::Null).unwrap_err();
    assert!(err.to_string().contains("panicked"), "{err}");
    assert!(err.to_string().contains("boom"), "{err}");
}

#[test]
fn runtime_errors_carry_the_call_position() {
    let err = run_err("result = sum(args, 1)", Value::from("x"));
    assert_eq!(err, "[1:9] first argument is not numeric");
}

fn run_err(source: &str, params: Value) -> String {
    parse(Options::new(), source)
        .unwrap()
        .execute(params)
        .unwrap_err()
        .to_string()
}

#[test]
fn sub_templates_render_through_str_template() {
    let options = Options::new()
        .string_template("greet", "Hello, {{.name}}!")
        .unwrap();
    let template = parse(options, "result = .greet(args)").unwrap();
    let out = template
        .execute(Value::from(json!({"name": "World"})))
        .unwrap();
    assert_eq!(as_json(&out), json!("Hello, World!"));
}

#[test]
fn sub_templates_can_call_string_functions() {
    let mut helpers: json_template::HelperMap = Default::default();
    helpers.insert(
        "upper".to_string(),
        std::sync::Arc::new(|v: &Value| match v {
            Value::Str(s) => Ok(s.to_uppercase()),
            other => Ok(other.to_string()),
        }),
    );
    let options = Options::new()
        .string_functions(helpers)
        .string_template("shout", "{{upper .name}}")
        .unwrap();
    let template = parse(options, "result = .shout(args)").unwrap();
    let out = template
        .execute(Value::from(json!({"name": "quiet"})))
        .unwrap();
    assert_eq!(as_json(&out), json!("QUIET"));
}

#[test]
fn parse_errors_format_line_and_offset() {
    let err = parse(Options::new(), "if args\n\tresult = args\n").unwrap_err();
    assert_eq!(err.to_string(), "[1:0] unexpected end in `if` block");
}

#[test]
fn execution_is_pure_for_immutable_params() {
    let template = parse(Options::new(), COPY_X).unwrap();
    let params = Value::from(json!({"x": {"nested": [1, 2]}}));
    let first = template.execute(params.clone()).unwrap();
    let second = template.execute(params).unwrap();
    assert_eq!(as_json(&first), as_json(&second));
}

#[test]
fn templates_are_shareable_across_threads() {
    let template = parse(Options::new(), COPY_X).unwrap();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let template = &template;
                scope.spawn(move || {
                    let out = template
                        .execute(Value::from(json!({"x": i})))
                        .unwrap();
                    as_json(&out)
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let want = if i == 0 { json!({"x": null}) } else { json!({"x": i}) };
            assert_eq!(handle.join().unwrap(), want);
        }
    });
}

#[test]
fn assignment_is_by_value() {
    // x takes a deep copy of result; later writes to result must not
    // show through x.
    let source = r#"
        result.a = 1
        x = result
        result.a = 2
        result.copy = x
    "#;
    let out = run(source, Value::Null);
    assert_eq!(as_json(&out), json!({"a": 2, "copy": {"a": 1}}));
}

#[test]
fn append_through_a_path_creates_and_extends() {
    let source = r#"
        result.items[] = 1
        result.items[] = 2
    "#;
    let out = run(source, Value::Null);
    assert_eq!(as_json(&out), json!({"items": [1, 2]}));
}

#[test]
fn foreach_over_scalars_is_a_no_op() {
    let out = run(
        "result = 0\nfor _ v in args\n\tresult = 1\nend\n",
        Value::from(json!(42)),
    );
    assert_eq!(as_json(&out), json!(0));
}
