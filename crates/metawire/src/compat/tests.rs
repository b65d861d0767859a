// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end compatibility scenarios: peers with drifting class
//! versions, cyclic graphs, slot-mode hooks, and the failure paths.

use crate::config::{CompatibleMode, SerdeConfig};
use crate::engine::Engine;
use crate::error::SerdeError;
use crate::meta::MetaContext;
use crate::model::type_ref::{PrimitiveKind, TypeRef};
use crate::model::value::{ObjRef, Record, Value};
use crate::registry::{ClassRegistry, RecordType};
use parking_lot::Mutex;
use std::sync::Arc;

fn i32_t() -> TypeRef {
    TypeRef::Primitive(PrimitiveKind::I32)
}

fn engine_with(types: Vec<Arc<RecordType>>) -> Engine {
    engine_with_config(SerdeConfig::default(), types)
}

fn engine_with_config(config: SerdeConfig, types: Vec<Arc<RecordType>>) -> Engine {
    let registry = Arc::new(ClassRegistry::new());
    for ty in types {
        registry.register(ty);
    }
    Engine::new(config, registry).expect("engine should build")
}

fn instance(engine: &Engine, name: &str) -> ObjRef {
    let ty = engine.registry().get(name).expect("type should be registered");
    Record::new_default(&ty).expect("allocation should succeed")
}

fn get_i32(obj: &ObjRef, name: &str) -> i32 {
    match obj.lock().get(name) {
        Some(Value::I32(v)) => *v,
        other => panic!("field {} is {:?}, expected i32", name, other),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[test]
fn test_added_field_keeps_default() {
    let sender = engine_with(vec![RecordType::builder("Point")
        .field("x", i32_t())
        .field("y", i32_t())
        .build()]);
    let receiver = engine_with(vec![RecordType::builder("Point")
        .field("x", i32_t())
        .field("y", i32_t())
        .field("z", i32_t())
        .build()]);

    let point = instance(&sender, "Point");
    point.lock().set("x", 3).expect("set should succeed");
    point.lock().set("y", 4).expect("set should succeed");

    let bytes = sender
        .serialize(&point, &mut MetaContext::new())
        .expect("serialize should succeed");
    let out = receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");

    assert_eq!(get_i32(&out, "x"), 3);
    assert_eq!(get_i32(&out, "y"), 4);
    assert_eq!(get_i32(&out, "z"), 0);
}

#[test]
fn test_removed_field_is_discarded() {
    let sender = engine_with(vec![RecordType::builder("Point")
        .field("x", i32_t())
        .field("y", i32_t())
        .field("z", i32_t())
        .build()]);
    let receiver = engine_with(vec![RecordType::builder("Point")
        .field("x", i32_t())
        .field("y", i32_t())
        .build()]);

    let point = instance(&sender, "Point");
    point.lock().set("x", 3).expect("set should succeed");
    point.lock().set("y", 4).expect("set should succeed");
    point.lock().set("z", 5).expect("set should succeed");

    let bytes = sender
        .serialize(&point, &mut MetaContext::new())
        .expect("serialize should succeed");
    let out = receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");

    assert_eq!(get_i32(&out, "x"), 3);
    assert_eq!(get_i32(&out, "y"), 4);
    assert_eq!(out.lock().get("z"), None);
}

#[test]
fn test_cyclic_graph_preserves_identity() {
    let node_type = RecordType::builder("Node")
        .field("v", TypeRef::Str)
        .field("next", TypeRef::object("Node"))
        .build();
    let engine = engine_with(vec![node_type]);

    let a = instance(&engine, "Node");
    let b = instance(&engine, "Node");
    a.lock().set("v", "a").expect("set should succeed");
    b.lock().set("v", "b").expect("set should succeed");
    a.lock()
        .set("next", b.clone())
        .expect("set should succeed");
    b.lock()
        .set("next", a.clone())
        .expect("set should succeed");

    let bytes = engine
        .serialize(&a, &mut MetaContext::new())
        .expect("serialize should succeed");
    let a2 = engine
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");

    assert_eq!(a2.lock().get("v"), Some(&Value::Str("a".into())));
    let b2 = a2
        .lock()
        .get("next")
        .and_then(|v| v.as_object().cloned())
        .expect("next should be a record");
    assert_eq!(b2.lock().get("v"), Some(&Value::Str("b".into())));
    let back = b2
        .lock()
        .get("next")
        .and_then(|v| v.as_object().cloned())
        .expect("next should be a record");
    assert!(Arc::ptr_eq(&back, &a2));
}

#[test]
fn test_shared_element_materializes_once() {
    let item = RecordType::builder("Item").field("tag", TypeRef::Str).build();
    let holder = RecordType::builder("Holder")
        .field("items", TypeRef::array(TypeRef::object("Item")))
        .build();
    let engine = engine_with(vec![item, holder]);

    let x = instance(&engine, "Item");
    x.lock().set("tag", "x").expect("set should succeed");
    let w = instance(&engine, "Holder");
    w.lock()
        .set(
            "items",
            vec![Value::Object(x.clone()), Value::Object(x.clone())],
        )
        .expect("set should succeed");

    let bytes = engine
        .serialize(&w, &mut MetaContext::new())
        .expect("serialize should succeed");
    let out = engine
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");

    let items = match out.lock().get("items") {
        Some(Value::Array(items)) => items.clone(),
        other => panic!("items is {:?}, expected an array", other),
    };
    assert_eq!(items.len(), 2);
    let first = items[0].as_object().expect("element should be a record");
    let second = items[1].as_object().expect("element should be a record");
    assert!(Arc::ptr_eq(first, second));
}

#[test]
fn test_slot_hooks_roundtrip_with_put_fields() {
    let base = RecordType::builder("Base")
        .field("u", i32_t())
        .field("v", i32_t())
        .write_hook(|_obj, stream| {
            let put = stream.put_fields();
            put.put("u", 1)?;
            put.put("v", 2)?;
            stream.write_fields()
        })
        .read_hook(|obj, stream| {
            let (u, v) = {
                let get = stream.read_fields()?;
                (get.get("u", 0)?, get.get("v", 0)?)
            };
            obj.lock().set("u", u)?;
            obj.lock().set("v", v)?;
            Ok(())
        })
        .build();
    let derived = RecordType::builder("Derived")
        .parent(base.clone())
        .field("label", TypeRef::Str)
        .build();
    let engine = engine_with(vec![base, derived]);

    let obj = instance(&engine, "Derived");
    obj.lock()
        .set("label", "hello")
        .expect("set should succeed");

    let bytes = engine
        .serialize(&obj, &mut MetaContext::new())
        .expect("serialize should succeed");
    let out = engine
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");

    assert_eq!(get_i32(&out, "u"), 1);
    assert_eq!(get_i32(&out, "v"), 2);
    assert_eq!(out.lock().get("label"), Some(&Value::Str("hello".into())));
}

#[test]
fn test_read_no_data_fires_for_trailing_local_slot() {
    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    // The sender's version of the hierarchy is just `B`.
    let sender = engine_with(vec![RecordType::builder("B")
        .field("u", i32_t())
        .write_hook(|_obj, stream| stream.default_write())
        .build()]);

    // The receiver's version extends `B` with a subclass the sender does
    // not have; the wire name maps onto it.
    let receiver_events = events.clone();
    let read_events = events.clone();
    let receiver_base = RecordType::builder("B")
        .field("u", i32_t())
        .read_hook(move |_obj, stream| {
            read_events.lock().push("B:read".into());
            stream.default_read()
        })
        .build();
    let receiver_derived = RecordType::builder("A")
        .parent(receiver_base.clone())
        .read_no_data(move |_obj| {
            receiver_events.lock().push("A:no_data".into());
            Ok(())
        })
        .build();
    let receiver = engine_with(vec![receiver_base, receiver_derived]);
    receiver.registry().add_alias("B", "A");

    let obj = instance(&sender, "B");
    obj.lock().set("u", 7).expect("set should succeed");
    let bytes = sender
        .serialize(&obj, &mut MetaContext::new())
        .expect("serialize should succeed");
    let out = receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");

    assert_eq!(out.lock().class().name(), "A");
    assert_eq!(get_i32(&out, "u"), 7);
    assert_eq!(
        events.lock().as_slice(),
        ["B:read".to_owned(), "A:no_data".to_owned()]
    );
}

#[test]
fn test_read_no_data_fires_for_inserted_base_slot() {
    let fired = Arc::new(Mutex::new(0u32));

    // Sender's `Thing` stands alone; receiver's `Thing` gained a base
    // class carrying a read_no_data hook.
    let sender = engine_with(vec![RecordType::builder("Thing")
        .field("n", i32_t())
        .write_hook(|_obj, stream| stream.default_write())
        .build()]);

    let fired_hook = fired.clone();
    let added_base = RecordType::builder("AddedBase")
        .field("extra", i32_t())
        .read_no_data(move |obj| {
            *fired_hook.lock() += 1;
            obj.lock().set("extra", 41)?;
            Ok(())
        })
        .build();
    let receiver_thing = RecordType::builder("Thing")
        .parent(added_base.clone())
        .field("n", i32_t())
        .read_hook(|_obj, stream| stream.default_read())
        .build();
    let receiver = engine_with(vec![added_base, receiver_thing]);

    let obj = instance(&sender, "Thing");
    obj.lock().set("n", 9).expect("set should succeed");
    let bytes = sender
        .serialize(&obj, &mut MetaContext::new())
        .expect("serialize should succeed");
    let out = receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");

    assert_eq!(*fired.lock(), 1);
    assert_eq!(get_i32(&out, "n"), 9);
    assert_eq!(get_i32(&out, "extra"), 41);
}

#[test]
fn test_classdef_bytes_travel_once_per_context() {
    let ty = RecordType::builder("Point")
        .field("x", i32_t())
        .field("y", i32_t())
        .build();
    let sender = engine_with(vec![ty.clone()]);
    let receiver = engine_with(vec![ty]);

    let point = instance(&sender, "Point");
    point.lock().set("x", 1).expect("set should succeed");

    let mut out_ctx = MetaContext::new();
    let mut in_ctx = MetaContext::new();

    let first = sender
        .serialize(&point, &mut out_ctx)
        .expect("serialize should succeed");
    let second = sender
        .serialize(&point, &mut out_ctx)
        .expect("serialize should succeed");

    assert!(contains(&first, b"Point"));
    assert!(!contains(&second, b"Point"));
    assert!(second.len() < first.len());

    let a = receiver
        .deserialize(&first, &mut in_ctx)
        .expect("deserialize should succeed");
    let b = receiver
        .deserialize(&second, &mut in_ctx)
        .expect("deserialize should succeed");
    assert_eq!(get_i32(&a, "x"), 1);
    assert_eq!(get_i32(&b, "x"), 1);
}

#[test]
fn test_encoding_is_deterministic() {
    let build = || {
        RecordType::builder("Rec")
            .field("name", TypeRef::Str)
            .field("count", TypeRef::Primitive(PrimitiveKind::I64))
            .field("ratio", TypeRef::Primitive(PrimitiveKind::F64))
            .build()
    };
    let first_engine = engine_with(vec![build()]);
    let second_engine = engine_with(vec![build()]);

    let fill = |engine: &Engine| {
        let obj = instance(engine, "Rec");
        obj.lock().set("name", "det").expect("set should succeed");
        obj.lock().set("count", 42i64).expect("set should succeed");
        obj.lock().set("ratio", 0.5f64).expect("set should succeed");
        obj
    };

    let a = first_engine
        .serialize(&fill(&first_engine), &mut MetaContext::new())
        .expect("serialize should succeed");
    let b = second_engine
        .serialize(&fill(&second_engine), &mut MetaContext::new())
        .expect("serialize should succeed");
    assert_eq!(a, b);
}

#[test]
fn test_mixed_scalars_and_arrays_roundtrip() {
    let ty = RecordType::builder("Sink")
        .field("flag", TypeRef::Primitive(PrimitiveKind::Bool))
        .field("tiny", TypeRef::Primitive(PrimitiveKind::I8))
        .field("short", TypeRef::Primitive(PrimitiveKind::I16))
        .field("glyph", TypeRef::Primitive(PrimitiveKind::Char))
        .field("ratio", TypeRef::Primitive(PrimitiveKind::F32))
        .field("boxed", TypeRef::Boxed(PrimitiveKind::I64))
        .field("empty_box", TypeRef::Boxed(PrimitiveKind::I32))
        .field("title", TypeRef::Str)
        .field("missing", TypeRef::Str)
        .field("scores", TypeRef::array(i32_t()))
        .build();
    let engine = engine_with(vec![ty]);

    let obj = instance(&engine, "Sink");
    {
        let mut rec = obj.lock();
        rec.set("flag", true).expect("set should succeed");
        rec.set("tiny", -3i8).expect("set should succeed");
        rec.set("short", 1024i16).expect("set should succeed");
        rec.set("glyph", 'Ω').expect("set should succeed");
        rec.set("ratio", 2.25f32).expect("set should succeed");
        rec.set("boxed", 99i64).expect("set should succeed");
        rec.set("title", "mixed").expect("set should succeed");
        rec.set("scores", vec![Value::I32(5), Value::I32(-6), Value::I32(7)])
            .expect("set should succeed");
    }

    let bytes = engine
        .serialize(&obj, &mut MetaContext::new())
        .expect("serialize should succeed");
    let out = engine
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");

    let rec = out.lock();
    assert_eq!(rec.get("flag"), Some(&Value::Bool(true)));
    assert_eq!(rec.get("tiny"), Some(&Value::I8(-3)));
    assert_eq!(rec.get("short"), Some(&Value::I16(1024)));
    assert_eq!(rec.get("glyph"), Some(&Value::Char('Ω')));
    assert_eq!(rec.get("ratio"), Some(&Value::F32(2.25)));
    assert_eq!(rec.get("boxed"), Some(&Value::I64(99)));
    assert_eq!(rec.get("empty_box"), Some(&Value::Null));
    assert_eq!(rec.get("title"), Some(&Value::Str("mixed".into())));
    assert_eq!(rec.get("missing"), Some(&Value::Null));
    assert_eq!(
        rec.get("scores"),
        Some(&Value::Array(vec![
            Value::I32(5),
            Value::I32(-6),
            Value::I32(7)
        ]))
    );
}

#[test]
fn test_boxed_and_unboxed_widen_across_peers() {
    let sender = engine_with(vec![RecordType::builder("Rec")
        .field("a", TypeRef::Boxed(PrimitiveKind::I32))
        .field("b", i32_t())
        .build()]);
    let receiver = engine_with(vec![RecordType::builder("Rec")
        .field("a", i32_t())
        .field("b", TypeRef::Boxed(PrimitiveKind::I32))
        .build()]);

    // `a` stays null on the sender; the receiver's unboxed field takes 0.
    let obj = instance(&sender, "Rec");
    obj.lock().set("b", 17).expect("set should succeed");

    let bytes = sender
        .serialize(&obj, &mut MetaContext::new())
        .expect("serialize should succeed");
    let out = receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");

    assert_eq!(get_i32(&out, "a"), 0);
    assert_eq!(out.lock().get("b"), Some(&Value::I32(17)));
}

#[test]
fn test_getfield_reports_peer_absent_fields() {
    let sender = engine_with(vec![RecordType::builder("B")
        .field("u", i32_t())
        .write_hook(|_obj, stream| {
            stream.put_fields().put("u", 9)?;
            stream.write_fields()
        })
        .build()]);

    let seen: Arc<Mutex<Vec<(bool, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_hook = seen.clone();
    let receiver = engine_with(vec![RecordType::builder("B")
        .field("u", i32_t())
        .field("v", i32_t())
        .read_hook(move |obj, stream| {
            let (u, v_defaulted, v) = {
                let get = stream.read_fields()?;
                (get.get("u", 0)?, get.defaulted("v")?, get.get("v", 42)?)
            };
            seen_hook.lock().push((v_defaulted, v.clone()));
            obj.lock().set("u", u)?;
            Ok(())
        })
        .build()]);

    let obj = instance(&sender, "B");
    let bytes = sender
        .serialize(&obj, &mut MetaContext::new())
        .expect("serialize should succeed");
    let out = receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");

    assert_eq!(get_i32(&out, "u"), 9);
    let records = seen.lock();
    assert_eq!(records.len(), 1);
    // The peer never wrote `v`: defaulted, and the fallback comes back.
    assert!(records[0].0);
    assert_eq!(records[0].1, Value::I32(42));
}

#[test]
fn test_validators_fire_in_descending_priority() {
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let sender = engine_with(vec![RecordType::builder("B")
        .field("u", i32_t())
        .write_hook(|_obj, stream| stream.default_write())
        .build()]);

    let order_hook = order.clone();
    let receiver = engine_with(vec![RecordType::builder("B")
        .field("u", i32_t())
        .read_hook(move |_obj, stream| {
            let low1 = order_hook.clone();
            stream.register_validation(
                Some(Box::new(move |_| {
                    low1.lock().push("low1");
                    Ok(())
                })),
                2,
            )?;
            let high = order_hook.clone();
            stream.register_validation(
                Some(Box::new(move |_| {
                    high.lock().push("high");
                    Ok(())
                })),
                5,
            )?;
            let low2 = order_hook.clone();
            stream.register_validation(
                Some(Box::new(move |_| {
                    low2.lock().push("low2");
                    Ok(())
                })),
                2,
            )?;
            stream.default_read()
        })
        .build()]);

    let obj = instance(&sender, "B");
    let bytes = sender
        .serialize(&obj, &mut MetaContext::new())
        .expect("serialize should succeed");
    receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");

    assert_eq!(order.lock().as_slice(), ["high", "low1", "low2"]);
}

#[test]
fn test_null_validator_is_invalid_object() {
    let sender = engine_with(vec![RecordType::builder("B")
        .field("u", i32_t())
        .write_hook(|_obj, stream| stream.default_write())
        .build()]);
    let receiver = engine_with(vec![RecordType::builder("B")
        .field("u", i32_t())
        .read_hook(|_obj, stream| {
            stream.register_validation(None, 1)?;
            stream.default_read()
        })
        .build()]);

    let obj = instance(&sender, "B");
    let bytes = sender
        .serialize(&obj, &mut MetaContext::new())
        .expect("serialize should succeed");
    let err = receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .unwrap_err();
    assert!(matches!(err, SerdeError::InvalidObject { .. }));
}

#[test]
fn test_unknown_put_field_name_rejected() {
    let engine = engine_with(vec![RecordType::builder("B")
        .field("u", i32_t())
        .write_hook(|_obj, stream| {
            stream.put_fields().put("nope", 1)?;
            stream.write_fields()
        })
        .read_hook(|_obj, stream| stream.default_read())
        .build()]);

    let obj = instance(&engine, "B");
    let err = engine.serialize(&obj, &mut MetaContext::new()).unwrap_err();
    assert!(matches!(err, SerdeError::UnknownField { .. }));
}

#[test]
fn test_double_default_write_is_not_active() {
    let engine = engine_with(vec![RecordType::builder("B")
        .field("u", i32_t())
        .write_hook(|_obj, stream| {
            stream.default_write()?;
            stream.default_write()
        })
        .read_hook(|_obj, stream| stream.default_read())
        .build()]);

    let obj = instance(&engine, "B");
    let err = engine.serialize(&obj, &mut MetaContext::new()).unwrap_err();
    assert!(matches!(err, SerdeError::NotActive { .. }));
}

#[test]
fn test_write_fields_without_record_is_not_active() {
    let engine = engine_with(vec![RecordType::builder("B")
        .field("u", i32_t())
        .write_hook(|_obj, stream| stream.write_fields())
        .read_hook(|_obj, stream| stream.default_read())
        .build()]);

    let obj = instance(&engine, "B");
    let err = engine.serialize(&obj, &mut MetaContext::new()).unwrap_err();
    assert!(matches!(err, SerdeError::NotActive { .. }));
}

#[test]
fn test_legacy_operations_are_unsupported() {
    let engine = engine_with(vec![RecordType::builder("B")
        .field("u", i32_t())
        .write_hook(|_obj, stream| stream.annotate_class())
        .read_hook(|_obj, stream| stream.default_read())
        .build()]);

    let obj = instance(&engine, "B");
    let err = engine.serialize(&obj, &mut MetaContext::new()).unwrap_err();
    assert!(matches!(err, SerdeError::UnsupportedEncoding { .. }));
}

#[test]
fn test_replace_hooks_disqualify_slot_mode() {
    let engine = engine_with(vec![RecordType::builder("B")
        .field("u", i32_t())
        .write_hook(|_obj, stream| stream.default_write())
        .with_replace_hooks()
        .build()]);

    let obj = instance(&engine, "B");
    let err = engine.serialize(&obj, &mut MetaContext::new()).unwrap_err();
    assert!(matches!(err, SerdeError::UnsupportedEncoding { .. }));
}

#[test]
fn test_duplicate_chain_fields_disqualify_slot_mode() {
    let base = RecordType::builder("Base")
        .field("v", i32_t())
        .write_hook(|_obj, stream| stream.default_write())
        .build();
    let derived = RecordType::builder("Derived")
        .parent(base.clone())
        .field("v", i32_t())
        .build();
    let engine = engine_with(vec![base, derived]);

    let obj = instance(&engine, "Derived");
    let err = engine.serialize(&obj, &mut MetaContext::new()).unwrap_err();
    assert!(matches!(err, SerdeError::SchemaMismatch { .. }));
}

#[test]
fn test_strict_mode_rejects_structural_drift() {
    let strict = || SerdeConfig::default().with_compatible_mode(CompatibleMode::Strict);
    let sender = engine_with_config(
        strict(),
        vec![RecordType::builder("Point")
            .field("x", i32_t())
            .field("y", i32_t())
            .build()],
    );
    let receiver = engine_with_config(
        strict(),
        vec![RecordType::builder("Point")
            .field("x", i32_t())
            .field("y", i32_t())
            .field("z", i32_t())
            .build()],
    );

    let point = instance(&sender, "Point");
    let bytes = sender
        .serialize(&point, &mut MetaContext::new())
        .expect("serialize should succeed");
    let err = receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .unwrap_err();
    assert!(matches!(err, SerdeError::SchemaMismatch { .. }));
}

#[test]
fn test_serialize_compat_fills_legacy_fields_with_zero() {
    let sender = engine_with(vec![RecordType::builder("Point")
        .field("x", i32_t())
        .field("y", i32_t())
        .build()]);
    let receiver_type = RecordType::builder("Point")
        .field("x", i32_t())
        .field("y", i32_t())
        .field("z", i32_t())
        .build();
    let receiver = engine_with(vec![receiver_type]);

    // The sender is pre-configured with the receiver's (wider) layout.
    let peer_def = receiver.class_def_for(
        &receiver
            .registry()
            .get("Point")
            .expect("type should be registered"),
    );

    let point = instance(&sender, "Point");
    point.lock().set("x", 3).expect("set should succeed");
    point.lock().set("y", 4).expect("set should succeed");

    let bytes = sender
        .serialize_compat(&point, &peer_def, &mut MetaContext::new())
        .expect("serialize should succeed");
    let out = receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");

    assert_eq!(get_i32(&out, "x"), 3);
    assert_eq!(get_i32(&out, "y"), 4);
    assert_eq!(get_i32(&out, "z"), 0);
}

#[test]
fn test_own_and_legacy_definitions_get_distinct_handles() {
    // The same local class travels under two definitions in one
    // context: a pre-configured legacy layout and its own. Each
    // definition gets its own handle, and each definition's bytes
    // travel exactly once.
    let sender = engine_with(vec![RecordType::builder("Point")
        .field("x", i32_t())
        .field("y", i32_t())
        .build()]);
    let receiver = engine_with(vec![RecordType::builder("Point")
        .field("x", i32_t())
        .field("y", i32_t())
        .field("z", i32_t())
        .build()]);

    let peer_def = receiver.class_def_for(
        &receiver
            .registry()
            .get("Point")
            .expect("type should be registered"),
    );

    let point = instance(&sender, "Point");
    point.lock().set("x", 3).expect("set should succeed");
    point.lock().set("y", 4).expect("set should succeed");

    let mut out_ctx = MetaContext::new();
    let mut in_ctx = MetaContext::new();

    let legacy = sender
        .serialize_compat(&point, &peer_def, &mut out_ctx)
        .expect("serialize should succeed");
    let own = sender
        .serialize(&point, &mut out_ctx)
        .expect("serialize should succeed");
    // Different shape, different id: the second definition travels
    // inline too instead of reusing the legacy handle.
    assert!(contains(&legacy, b"Point"));
    assert!(contains(&own, b"Point"));
    assert_eq!(out_ctx.shared_count(), 2);

    let from_legacy = receiver
        .deserialize(&legacy, &mut in_ctx)
        .expect("deserialize should succeed");
    let from_own = receiver
        .deserialize(&own, &mut in_ctx)
        .expect("deserialize should succeed");
    assert_eq!(in_ctx.read_defs().len(), 2);
    assert_ne!(in_ctx.read_defs()[0].id(), in_ctx.read_defs()[1].id());
    for out in [&from_legacy, &from_own] {
        assert_eq!(get_i32(out, "x"), 3);
        assert_eq!(get_i32(out, "y"), 4);
        assert_eq!(get_i32(out, "z"), 0);
    }

    // Repeats under either definition now travel by handle alone.
    let legacy_again = sender
        .serialize_compat(&point, &peer_def, &mut out_ctx)
        .expect("serialize should succeed");
    let own_again = sender
        .serialize(&point, &mut out_ctx)
        .expect("serialize should succeed");
    assert!(!contains(&legacy_again, b"Point"));
    assert!(!contains(&own_again, b"Point"));
    assert_eq!(out_ctx.shared_count(), 2);

    let repeat = receiver
        .deserialize(&legacy_again, &mut in_ctx)
        .expect("deserialize should succeed");
    assert_eq!(get_i32(&repeat, "x"), 3);
    let repeat = receiver
        .deserialize(&own_again, &mut in_ctx)
        .expect("deserialize should succeed");
    assert_eq!(get_i32(&repeat, "x"), 3);
    assert_eq!(in_ctx.read_defs().len(), 2);
}

#[test]
fn test_unknown_peer_class_is_read_and_discarded() {
    let gadget = RecordType::builder("Gadget")
        .field("serial", TypeRef::Primitive(PrimitiveKind::I64))
        .build();
    let sender = engine_with(vec![
        RecordType::builder("Carrier")
            .field("id", i32_t())
            .field("payload", TypeRef::object("Gadget"))
            .build(),
        gadget,
    ]);
    // The receiver knows neither the payload field nor its class.
    let receiver = engine_with(vec![RecordType::builder("Carrier")
        .field("id", i32_t())
        .build()]);

    let payload = instance(&sender, "Gadget");
    payload
        .lock()
        .set("serial", 123i64)
        .expect("set should succeed");
    let carrier = instance(&sender, "Carrier");
    carrier.lock().set("id", 8).expect("set should succeed");
    carrier
        .lock()
        .set("payload", payload)
        .expect("set should succeed");

    let bytes = sender
        .serialize(&carrier, &mut MetaContext::new())
        .expect("serialize should succeed");
    let out = receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");
    assert_eq!(get_i32(&out, "id"), 8);
}

#[test]
fn test_truncated_message_fails_cleanly() {
    let engine = engine_with(vec![RecordType::builder("Point")
        .field("x", i32_t())
        .field("label", TypeRef::Str)
        .build()]);
    let point = instance(&engine, "Point");
    point
        .lock()
        .set("label", "truncate me")
        .expect("set should succeed");

    let bytes = engine
        .serialize(&point, &mut MetaContext::new())
        .expect("serialize should succeed");
    for cut in [1usize, bytes.len() / 2, bytes.len() - 1] {
        let err = engine
            .deserialize(&bytes[..cut], &mut MetaContext::new())
            .unwrap_err();
        assert!(
            matches!(
                err,
                SerdeError::Eof { .. } | SerdeError::ProtocolViolation { .. }
            ),
            "cut at {} produced {:?}",
            cut,
            err
        );
    }
}

#[test]
fn test_transient_fields_stay_local() {
    let build = || {
        RecordType::builder("Session")
            .field("user", TypeRef::Str)
            .transient_field("cache", TypeRef::Str)
            .build()
    };
    let engine = engine_with(vec![build()]);

    let obj = instance(&engine, "Session");
    obj.lock()
        .set("user", "ada")
        .expect("set should succeed");
    obj.lock()
        .set("cache", "volatile")
        .expect("set should succeed");

    let bytes = engine
        .serialize(&obj, &mut MetaContext::new())
        .expect("serialize should succeed");
    assert!(!contains(&bytes, b"volatile"));

    let out = engine
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");
    assert_eq!(out.lock().get("user"), Some(&Value::Str("ada".into())));
    assert_eq!(out.lock().get("cache"), Some(&Value::Null));
}

#[test]
fn test_slot_payloads_share_the_meta_context() {
    // Two messages with a slot-mode type: the second carries handles
    // only, for the outer class and for every slot class.
    let base = RecordType::builder("Base")
        .field("u", i32_t())
        .write_hook(|_obj, stream| stream.default_write())
        .read_hook(|_obj, stream| stream.default_read())
        .build();
    let derived = RecordType::builder("Derived")
        .parent(base.clone())
        .field("w", i32_t())
        .build();
    let sender = engine_with(vec![base.clone(), derived.clone()]);
    let receiver = engine_with(vec![base, derived]);

    let mut out_ctx = MetaContext::new();
    let mut in_ctx = MetaContext::new();

    let obj = instance(&sender, "Derived");
    obj.lock().set("u", 1).expect("set should succeed");
    obj.lock().set("w", 2).expect("set should succeed");

    let first = sender
        .serialize(&obj, &mut out_ctx)
        .expect("serialize should succeed");
    let second = sender
        .serialize(&obj, &mut out_ctx)
        .expect("serialize should succeed");
    assert!(contains(&first, b"Base"));
    assert!(!contains(&second, b"Base"));
    assert!(!contains(&second, b"Derived"));

    for bytes in [&first, &second] {
        let out = receiver
            .deserialize(bytes, &mut in_ctx)
            .expect("deserialize should succeed");
        assert_eq!(get_i32(&out, "u"), 1);
        assert_eq!(get_i32(&out, "w"), 2);
    }
}

#[test]
fn test_class_version_check_detects_drift() {
    let versioned = || {
        SerdeConfig::default()
            .with_meta_share(false)
            .with_check_class_version(true)
    };
    let sender = engine_with_config(
        versioned(),
        vec![RecordType::builder("Point")
            .field("x", i32_t())
            .field("y", i32_t())
            .build()],
    );
    let same_receiver = engine_with_config(
        versioned(),
        vec![RecordType::builder("Point")
            .field("x", i32_t())
            .field("y", i32_t())
            .build()],
    );
    let drifted_receiver = engine_with_config(
        versioned(),
        vec![RecordType::builder("Point")
            .field("x", i32_t())
            .field("y", i32_t())
            .field("z", i32_t())
            .build()],
    );

    let point = instance(&sender, "Point");
    point.lock().set("x", 3).expect("set should succeed");
    let bytes = sender
        .serialize(&point, &mut MetaContext::new())
        .expect("serialize should succeed");

    let out = same_receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");
    assert_eq!(get_i32(&out, "x"), 3);

    let err = drifted_receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .unwrap_err();
    assert!(matches!(err, SerdeError::SchemaMismatch { .. }));
}

#[test]
fn test_uncompressed_scalars_roundtrip() {
    let plain = || {
        SerdeConfig::default()
            .with_compress_ints(false)
            .with_compress_longs(false)
    };
    let build = || {
        RecordType::builder("Wide")
            .field("n", i32_t())
            .field("l", TypeRef::Primitive(PrimitiveKind::I64))
            .build()
    };
    let sender = engine_with_config(plain(), vec![build()]);
    let receiver = engine_with_config(plain(), vec![build()]);

    let obj = instance(&sender, "Wide");
    obj.lock().set("n", -123456).expect("set should succeed");
    obj.lock()
        .set("l", -987654321i64)
        .expect("set should succeed");

    let bytes = sender
        .serialize(&obj, &mut MetaContext::new())
        .expect("serialize should succeed");
    let out = receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");
    assert_eq!(get_i32(&out, "n"), -123456);
    assert_eq!(out.lock().get("l"), Some(&Value::I64(-987654321)));
}

#[test]
fn test_non_constructible_target_fails_construction() {
    let sender = engine_with(vec![RecordType::builder("Ghost")
        .field("x", i32_t())
        .build()]);
    let receiver = engine_with(vec![RecordType::builder("Ghost")
        .field("x", i32_t())
        .non_constructible()
        .build()]);

    let obj = instance(&sender, "Ghost");
    let bytes = sender
        .serialize(&obj, &mut MetaContext::new())
        .expect("serialize should succeed");
    let err = receiver
        .deserialize(&bytes, &mut MetaContext::new())
        .unwrap_err();
    assert!(matches!(err, SerdeError::ConstructionFailed { .. }));
}

#[test]
fn test_sealed_object_fields_roundtrip() {
    let point = RecordType::builder("Point")
        .field("x", i32_t())
        .field("y", i32_t())
        .build();
    let rect = RecordType::builder("Rect")
        .field("origin", TypeRef::sealed_object("Point"))
        .field("corner", TypeRef::sealed_object("Point"))
        .field("name", TypeRef::Str)
        .build();
    let engine = engine_with(vec![point, rect]);

    let origin = instance(&engine, "Point");
    origin.lock().set("x", 1).expect("set should succeed");
    let rect_obj = instance(&engine, "Rect");
    rect_obj
        .lock()
        .set("origin", origin.clone())
        .expect("set should succeed");
    rect_obj
        .lock()
        .set("corner", origin)
        .expect("set should succeed");
    rect_obj
        .lock()
        .set("name", "r1")
        .expect("set should succeed");

    let bytes = engine
        .serialize(&rect_obj, &mut MetaContext::new())
        .expect("serialize should succeed");
    let out = engine
        .deserialize(&bytes, &mut MetaContext::new())
        .expect("deserialize should succeed");

    let o = out
        .lock()
        .get("origin")
        .and_then(|v| v.as_object().cloned())
        .expect("origin should be a record");
    let c = out
        .lock()
        .get("corner")
        .and_then(|v| v.as_object().cloned())
        .expect("corner should be a record");
    assert!(Arc::ptr_eq(&o, &c));
    assert_eq!(get_i32(&o, "x"), 1);
}
