//! JSON-shape built-ins: `@clone`, `@get`, `@jsonSet`, `@append`.
//!
//! All four walk values structurally, decoding raw blobs on demand.
//! Object keys coerce to strings; array keys coerce to integers
//! (floats within 0.001 of an integer round, anything else is
//! invalid).

use crate::funcs::FuncError;
use crate::value::Value;
use indexmap::IndexMap;

/// `@clone(v)` — identity for primitives and raw blobs; structured
/// values round-trip through JSON into a raw blob, which is what makes
/// assignment by-value.
pub fn clone(args: &[Value]) -> Result<Value, FuncError> {
    let v = &args[0];
    match v {
        Value::Array(_) | Value::Object(_) => Ok(Value::raw(v.encode()?)),
        other => Ok(other.clone()),
    }
}

/// `@get(val, k1, …, kn)` — walk a path; missing or invalid steps
/// produce null.
pub fn get(args: &[Value]) -> Result<Value, FuncError> {
    json_get(&args[0], &args[1..])
}

/// `@jsonSet(data, val, k1, …, kn)` — set the value at a path,
/// creating missing nodes.
pub fn set(args: &[Value]) -> Result<Value, FuncError> {
    json_set(args[0].clone(), args[1].clone(), &args[2..])
}

/// `@append(data, val, k1, …, kn)` — append `val` to the collection at
/// the path.
pub fn append(args: &[Value]) -> Result<Value, FuncError> {
    json_append(args[0].clone(), args[1].clone(), &args[2..])
}

pub(crate) fn json_get(val: &Value, path: &[Value]) -> Result<Value, FuncError> {
    if path.is_empty() {
        return Ok(val.clone());
    }
    match val {
        Value::Null
        | Value::Bool(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::Str(_) => Ok(Value::Null),
        Value::Object(map) => match map.get(&string_key(&path[0])?) {
            Some(inner) => json_get(inner, &path[1..]),
            None => Ok(Value::Null),
        },
        Value::Array(items) => match int_key(&path[0])? {
            Some(key) if key >= 0 && (key as usize) < items.len() => {
                json_get(&items[key as usize], &path[1..])
            }
            _ => Ok(Value::Null),
        },
        Value::Raw(_) => json_get(&val.decoded()?, path),
        Value::Iter(_) | Value::Tmpl(_) => Ok(Value::Null),
    }
}

pub(crate) fn json_set(data: Value, val: Value, path: &[Value]) -> Result<Value, FuncError> {
    if path.is_empty() {
        return Ok(val);
    }
    match data {
        Value::Null
        | Value::Bool(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::Str(_) => json_new(val, path),
        Value::Object(mut map) => {
            let key = string_key(&path[0])?;
            let cur = match map.get_mut(&key) {
                Some(slot) => std::mem::take(slot),
                None => Value::Null,
            };
            let new = json_set(cur, val, &path[1..])?;
            map.insert(key, new);
            Ok(Value::Object(map))
        }
        Value::Array(mut items) => {
            let key = int_key(&path[0])?.ok_or_else(|| {
                FuncError::new(format!("can't use `{}` as array index", path[0]))
            })?;
            let len = items.len() as i64;
            if key >= len {
                // Extend with nulls so the new index is the last element.
                let new = json_new(val, &path[1..])?;
                items.resize(key as usize, Value::Null);
                items.push(new);
            } else if key >= -len {
                let idx = if key < 0 { len + key } else { key } as usize;
                let cur = std::mem::take(&mut items[idx]);
                items[idx] = json_set(cur, val, &path[1..])?;
            } else {
                // Far negative: prepend nulls, new value lands at index 0.
                let new = json_new(val, &path[1..])?;
                let mut out = vec![Value::Null; (-len - key) as usize];
                out[0] = new;
                out.extend(items);
                items = out;
            }
            Ok(Value::Array(items))
        }
        Value::Raw(_) => json_set(data.decoded()?, val, path),
        Value::Iter(_) | Value::Tmpl(_) => Err(FuncError::new(format!(
            "cannot set a path in {}",
            data.kind_name()
        ))),
    }
}

/// Create a fresh node holding `val` at the given path: a non-negative
/// integer head makes an array, anything else a single-entry object.
pub(crate) fn json_new(val: Value, path: &[Value]) -> Result<Value, FuncError> {
    if path.is_empty() {
        return Ok(val);
    }
    if matches!(path[0], Value::Int(_) | Value::Float(_)) {
        if let Some(key) = int_key(&path[0])? {
            if key >= 0 {
                let mut items = vec![Value::Null; key as usize + 1];
                items[key as usize] = json_new(val, &path[1..])?;
                return Ok(Value::Array(items));
            }
        }
    }
    let key = string_key(&path[0])?;
    let mut map = IndexMap::with_capacity(1);
    map.insert(key, json_new(val, &path[1..])?);
    Ok(Value::Object(map))
}

pub(crate) fn json_append(data: Value, val: Value, path: &[Value]) -> Result<Value, FuncError> {
    if path.is_empty() {
        return append_cur(data, val);
    }
    let node = json_get(&data, path)?;
    let node = append_cur(node, val)?;
    json_set(data, node, path)
}

fn append_cur(data: Value, val: Value) -> Result<Value, FuncError> {
    match data {
        Value::Null
        | Value::Bool(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::Str(_) => Ok(Value::Array(vec![val])),
        Value::Array(mut items) => {
            items.push(val);
            Ok(Value::Array(items))
        }
        Value::Object(mut map) => {
            // Insert at the smallest non-negative integer key not taken.
            let mut i: u64 = 0;
            while map.contains_key(&i.to_string()) {
                i += 1;
            }
            map.insert(i.to_string(), val);
            Ok(Value::Object(map))
        }
        Value::Raw(_) => append_cur(data.decoded()?, val),
        Value::Iter(_) | Value::Tmpl(_) => Err(FuncError::new(format!(
            "cannot append to {}",
            data.kind_name()
        ))),
    }
}

/// Coerce a path step to an object key.
pub(crate) fn string_key(v: &Value) -> Result<String, FuncError> {
    match v {
        Value::Str(s) => Ok(s.clone()),
        Value::Raw(_) => string_key(&v.decoded()?),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Array(_) | Value::Object(_) => v.encode(),
        Value::Iter(_) | Value::Tmpl(_) => Err(FuncError::new(format!(
            "cannot use {} as object key",
            v.kind_name()
        ))),
    }
}

/// Coerce a path step to an array index; `None` means the step cannot
/// index an array.
pub(crate) fn int_key(v: &Value) -> Result<Option<i64>, FuncError> {
    match v {
        Value::Int(i) => Ok(Some(*i)),
        Value::Float(f) => {
            let rounded = f.round();
            if (rounded - f).abs() < 0.001 {
                Ok(Some(rounded as i64))
            } else {
                Ok(None)
            }
        }
        Value::Raw(_) => int_key(&v.decoded()?),
        other => Ok(string_key(other)?.parse::<i64>().ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(j: serde_json::Value) -> Value {
        Value::from(j)
    }

    #[test]
    fn get_walks_objects_and_arrays() {
        let data = v(json!({"a": {"b": [10, 20, 30]}}));
        let path = [Value::from("a"), Value::from("b"), Value::Int(1)];
        assert_eq!(json_get(&data, &path).unwrap(), Value::Int(20));
    }

    #[test]
    fn get_missing_and_invalid_steps_are_null() {
        let data = v(json!({"a": [1]}));
        assert_eq!(
            json_get(&data, &[Value::from("zzz")]).unwrap(),
            Value::Null
        );
        assert_eq!(
            json_get(&data, &[Value::from("a"), Value::Int(9)]).unwrap(),
            Value::Null
        );
        assert_eq!(
            json_get(&data, &[Value::from("a"), Value::Int(-1)]).unwrap(),
            Value::Null
        );
        assert_eq!(
            json_get(&Value::Int(5), &[Value::from("a")]).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn get_decodes_raw_blobs() {
        let data = Value::raw(r#"{"x": [1, 2, 3]}"#);
        assert_eq!(
            json_get(&data, &[Value::from("x"), Value::Int(2)]).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn get_rounds_near_integer_float_keys() {
        let data = v(json!([10, 20]));
        assert_eq!(
            json_get(&data, &[Value::Float(1.0004)]).unwrap(),
            Value::Int(20)
        );
        assert_eq!(json_get(&data, &[Value::Float(1.4)]).unwrap(), Value::Null);
    }

    #[test]
    fn set_into_fresh_array_extends_with_nulls() {
        let out = json_set(Value::Null, Value::from("z"), &[Value::Int(5)]).unwrap();
        assert_eq!(out, v(json!([null, null, null, null, null, "z"])));
    }

    #[test]
    fn set_past_the_end_of_an_existing_array() {
        let out = json_set(v(json!([1, 2, 3])), Value::from("z"), &[Value::Int(5)]).unwrap();
        assert_eq!(out, v(json!([1, 2, 3, null, null, "z"])));
    }

    #[test]
    fn set_with_small_negative_index_counts_from_the_end() {
        let out = json_set(v(json!([1, 2, 3])), Value::from("a"), &[Value::Int(-2)]).unwrap();
        assert_eq!(out, v(json!([1, "a", 3])));
    }

    #[test]
    fn set_with_far_negative_index_prepends_nulls() {
        let out = json_set(v(json!([1, 2, 3])), Value::from("a"), &[Value::Int(-10)]).unwrap();
        assert_eq!(
            out,
            v(json!(["a", null, null, null, null, null, null, 1, 2, 3]))
        );
        match &out {
            Value::Array(items) => assert_eq!(items.len(), 10),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn set_creates_nested_objects() {
        let out = json_set(
            Value::Null,
            Value::Int(1),
            &[Value::from("a"), Value::from("b")],
        )
        .unwrap();
        assert_eq!(out, v(json!({"a": {"b": 1}})));
    }

    #[test]
    fn set_rejects_non_integer_array_index() {
        let err = json_set(v(json!([1])), Value::Int(0), &[Value::from("x")]).unwrap_err();
        assert!(err.to_string().contains("array index"));
    }

    #[test]
    fn append_wraps_the_value_replacing_primitives() {
        let out = json_append(Value::from("x"), Value::Int(1), &[]).unwrap();
        assert_eq!(out, v(json!([1])));
        let out = json_append(Value::Null, Value::Int(1), &[]).unwrap();
        assert_eq!(out, v(json!([1])));
    }

    #[test]
    fn append_pushes_to_arrays() {
        let out = json_append(v(json!([1])), Value::Int(2), &[]).unwrap();
        assert_eq!(out, v(json!([1, 2])));
    }

    #[test]
    fn append_to_object_uses_free_integer_keys() {
        let out = json_append(v(json!({"0": "a", "2": "c"})), Value::from("b"), &[]).unwrap();
        assert_eq!(out, v(json!({"0": "a", "2": "c", "1": "b"})));
    }

    #[test]
    fn append_at_a_missing_path_creates_the_array() {
        let out = json_append(
            v(json!({"obj": {}})),
            Value::Int(7),
            &[Value::from("arr")],
        )
        .unwrap();
        assert_eq!(out, v(json!({"obj": {}, "arr": [7]})));
    }

    #[test]
    fn append_decodes_raw_containers() {
        let out = json_append(Value::raw("[1,2]"), Value::Int(3), &[]).unwrap();
        assert_eq!(out, v(json!([1, 2, 3])));
    }

    #[test]
    fn clone_is_identity_for_primitives_and_blobs() {
        for val in [
            Value::Null,
            Value::Int(3),
            Value::from("s"),
            Value::raw("[1]"),
        ] {
            assert_eq!(clone(&[val.clone()]).unwrap(), val);
        }
    }

    #[test]
    fn clone_turns_structures_into_blobs() {
        let out = clone(&[v(json!({"a": 1}))]).unwrap();
        match &out {
            Value::Raw(text) => assert_eq!(text.as_ref(), r#"{"a":1}"#),
            other => panic!("expected raw blob, got {other:?}"),
        }
    }

    #[test]
    fn truthiness_survives_clone() {
        for val in [
            Value::raw("{}"),
            Value::raw("[]"),
            Value::raw("null"),
            Value::raw("0"),
            Value::raw("\"\""),
            Value::Null,
            Value::Int(0),
            Value::from(""),
            v(json!([1])),
            v(json!({"a": 1})),
            Value::Bool(true),
        ] {
            let cloned = clone(&[val.clone()]).unwrap();
            assert_eq!(cloned.is_empty(), val.is_empty(), "clone changed truthiness of {val:?}");
        }
    }

    #[test]
    fn string_keys_coerce() {
        assert_eq!(string_key(&Value::Int(3)).unwrap(), "3");
        assert_eq!(string_key(&Value::Float(2.0)).unwrap(), "2");
        assert_eq!(string_key(&Value::Float(1.5)).unwrap(), "1.5");
        assert_eq!(string_key(&Value::Bool(true)).unwrap(), "true");
        assert_eq!(string_key(&Value::raw("\"k\"")).unwrap(), "k");
    }

    #[test]
    fn int_keys_coerce() {
        assert_eq!(int_key(&Value::Int(3)).unwrap(), Some(3));
        assert_eq!(int_key(&Value::from("7")).unwrap(), Some(7));
        assert_eq!(int_key(&Value::from("x")).unwrap(), None);
        assert_eq!(int_key(&Value::Bool(true)).unwrap(), None);
        assert_eq!(int_key(&Value::raw("4")).unwrap(), Some(4));
    }
}
