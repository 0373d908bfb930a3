use crate::helper::*;

use cafe_prolog::*;

#[test]
fn atom_chars() {
    let mut machine = Machine::default();

    let query = call(
        "atom_chars",
        [var("X"), Term::list([Term::atom("a"), Term::atom("b")])],
    );
    assert_eq!(answers_for(&mut machine, query, "X"), Ok(vec![Term::atom("ab")]));

    let query = call("atom_chars", [Term::atom("abc"), var("L")]);
    assert_eq!(
        answers_for(&mut machine, query, "L"),
        Ok(vec![Term::list(["a", "b", "c"].map(Term::atom))])
    );

    // a bound second argument is checked against the characters.
    let query = call(
        "atom_chars",
        [Term::atom("ab"), Term::list([Term::atom("a"), var("C")])],
    );
    assert_eq!(answers_for(&mut machine, query, "C"), Ok(vec![Term::atom("b")]));

    let query = call("atom_chars", [Term::atom("ab"), Term::list([Term::atom("b")])]);
    assert_eq!(machine.run_query_to_vec(query), Ok(vec![LeafAnswer::False]));
}

#[test]
fn atom_chars_edge_cases() {
    let mut machine = Machine::default();

    let query = call("atom_chars", [var("X"), Term::List(vec![])]);
    assert_eq!(answers_for(&mut machine, query, "X"), Ok(vec![Term::atom("")]));

    let query = call("atom_chars", [Term::atom(""), var("L")]);
    assert_eq!(answers_for(&mut machine, query, "L"), Ok(vec![Term::List(vec![])]));

    let query = call("atom_chars", [Term::atom("héllo"), var("L")]);
    assert_eq!(
        answers_for(&mut machine, query, "L"),
        Ok(vec![Term::list(["h", "é", "l", "l", "o"].map(Term::atom))])
    );
}

#[test]
fn atom_chars_errors() {
    let mut machine = Machine::default();

    let partial = call(".", [Term::atom("a"), var("_")]);
    assert_eq!(
        error_of(&mut machine, call("atom_chars", [var("X"), partial])),
        "error(instantiation_error,context(atom_chars/2,2))"
    );

    assert_eq!(
        error_of(&mut machine, call("atom_chars", [var("X"), var("Y")])),
        "error(instantiation_error,context(atom_chars/2,2))"
    );

    let chars = Term::list([Term::atom("a"), call("f", [Term::atom("b")])]);
    assert_eq!(
        error_of(&mut machine, call("atom_chars", [var("X"), chars])),
        "error(type_error(character,f(b)),context(atom_chars/2,2))"
    );

    let chars = Term::list([Term::atom("ab")]);
    assert_eq!(
        error_of(&mut machine, call("atom_chars", [var("X"), chars])),
        "error(type_error(character,ab),context(atom_chars/2,2))"
    );

    assert_eq!(
        error_of(&mut machine, call("atom_chars", [call("f", [Term::atom("x")]), var("L")])),
        "error(type_error(atom,f(x)),context(atom_chars/2,1))"
    );

    assert_eq!(
        error_of(&mut machine, call("atom_chars", [var("X"), Term::atom("foo")])),
        "error(type_error(list,foo),context(atom_chars/2,2))"
    );
}

fn machine_reading(bytes: &[u8]) -> Machine {
    MachineBuilder::new()
        .with_streams(StreamConfig {
            stdin: InputStreamConfig::bytes(bytes),
            stdout: OutputStreamConfig::memory(),
            stderr: OutputStreamConfig::null(),
        })
        .build()
}

#[test]
fn get_byte_reads_to_the_end() {
    let mut machine = machine_reading(b"hi");

    let query = Term::conjunction([
        call("get_byte", [Term::atom("user_input"), var("A")]),
        call("get_byte", [Term::atom("user_input"), var("B")]),
        call("get_byte", [Term::atom("user_input"), var("C")]),
    ]);

    assert_eq!(
        machine.run_query_to_vec(query),
        Ok(vec![LeafAnswer::from_bindings([
            ("A", Term::integer(104)),
            ("B", Term::integer(105)),
            ("C", Term::integer(-1)),
        ])])
    );

    // a bound byte is compared with the one consumed.
    let mut machine = machine_reading(b"hi");

    let query = call("get_byte", [Term::atom("user_input"), Term::integer(105)]);
    assert_eq!(machine.run_query_to_vec(query.clone()), Ok(vec![LeafAnswer::False]));
    assert_eq!(machine.run_query_to_vec(query), Ok(vec![LeafAnswer::True]));
}

#[test]
fn null_input_is_at_end_of_stream() {
    let mut machine = Machine::default();

    let query = call("get_byte", [Term::atom("user_input"), var("B")]);
    assert_eq!(answers_for(&mut machine, query, "B"), Ok(vec![Term::integer(-1)]));
}

#[test]
fn get_byte_errors() {
    let mut machine = machine_reading(b"x");

    assert_eq!(
        error_of(&mut machine, call("get_byte", [Term::atom("user_input"), Term::atom("foo")])),
        "error(type_error(in_byte,foo),context(get_byte/2,2))"
    );
    assert_eq!(
        error_of(&mut machine, call("get_byte", [Term::atom("user_input"), Term::integer(300)])),
        "error(representation_error(in_byte),context(get_byte/2,2))"
    );
    assert_eq!(
        error_of(&mut machine, call("get_byte", [Term::atom("user_output"), var("B")])),
        "error(permission_error(input,stream,user_output),context(get_byte/2,1))"
    );
    assert_eq!(
        error_of(&mut machine, call("get_byte", [Term::atom("nosuch"), var("B")])),
        "error(existence_error(stream,nosuch),context(get_byte/2,1))"
    );
    assert_eq!(
        error_of(&mut machine, call("get_byte", [Term::integer(42), var("B")])),
        "error(domain_error(stream_or_alias,42),context(get_byte/2,1))"
    );
    assert_eq!(
        error_of(&mut machine, call("get_byte", [var("S"), var("B")])),
        "error(instantiation_error,context(get_byte/2,1))"
    );

    // none of the refused calls consumed input.
    let query = call("get_byte", [Term::atom("user_input"), var("B")]);
    assert_eq!(answers_for(&mut machine, query, "B"), Ok(vec![Term::integer(120)]));
}

#[test]
fn byte_builtins_refuse_text_streams() {
    let mut machine = MachineBuilder::new()
        .with_streams(StreamConfig {
            stdin: InputStreamConfig::null(),
            stdout: OutputStreamConfig::memory(),
            stderr: OutputStreamConfig::stderr(),
        })
        .build();

    assert_eq!(
        error_of(&mut machine, call("put_byte", [Term::atom("user_error"), Term::integer(65)])),
        "error(permission_error(output,text_stream,user_error),context(put_byte/2,1))"
    );
}

#[test]
fn put_byte_writes_and_checks_its_byte() {
    let mut machine = Machine::default();

    let query = Term::conjunction(
        b"hello"
            .iter()
            .map(|&b| call("put_byte", [Term::atom("user_output"), Term::integer(b)])),
    );

    assert_eq!(machine.run_query_to_vec(query), Ok(vec![LeafAnswer::True]));
    assert_eq!(machine.user_output_string().as_deref(), Some("hello"));

    assert_eq!(
        error_of(&mut machine, call("put_byte", [Term::atom("user_output"), var("B")])),
        "error(instantiation_error,context(put_byte/2,2))"
    );
    assert_eq!(
        error_of(&mut machine, call("put_byte", [Term::atom("user_output"), Term::integer(256)])),
        "error(type_error(byte,256),context(put_byte/2,2))"
    );
    assert_eq!(
        error_of(&mut machine, call("put_byte", [Term::atom("user_output"), Term::atom("a")])),
        "error(type_error(byte,a),context(put_byte/2,2))"
    );
    assert_eq!(
        error_of(&mut machine, call("put_byte", [Term::atom("user_input"), Term::integer(1)])),
        "error(permission_error(output,stream,user_input),context(put_byte/2,1))"
    );

    // refused writes leave the output untouched.
    assert_eq!(machine.user_output_string().as_deref(), Some("hello"));
}

#[test]
fn null_output_discards_bytes() {
    let mut machine = MachineBuilder::new()
        .with_streams(StreamConfig {
            stdin: InputStreamConfig::null(),
            stdout: OutputStreamConfig::null(),
            stderr: OutputStreamConfig::null(),
        })
        .build();

    let query = call("put_byte", [Term::atom("user_output"), Term::integer(1)]);

    assert_eq!(machine.run_query_to_vec(query), Ok(vec![LeafAnswer::True]));
    assert_eq!(machine.user_output_contents(), None);

    // a null stream only works in the direction it was configured for.
    assert_eq!(
        error_of(&mut machine, call("get_byte", [Term::atom("user_output"), var("B")])),
        "error(permission_error(input,stream,user_output),context(get_byte/2,1))"
    );
    assert_eq!(
        error_of(&mut machine, call("put_byte", [Term::atom("user_input"), Term::integer(1)])),
        "error(permission_error(output,stream,user_input),context(put_byte/2,1))"
    );
}

fn with_cache(goals: impl IntoIterator<Item = Term>) -> Term {
    let new_hash = call(
        "new_hash",
        [var("_H"), Term::list([call("alias", [Term::atom("cache")])])],
    );

    Term::conjunction(std::iter::once(new_hash).chain(goals))
}

fn cache_call(name: &str, args: impl IntoIterator<Item = Term>) -> Term {
    call(name, std::iter::once(Term::atom("cache")).chain(args))
}

#[test]
fn hash_tables_store_owned_copies() {
    let mut machine = Machine::default();

    let query = with_cache([
        cache_call("hash_put", [Term::atom("k"), call("f", [var("X")])]),
        call("=", [var("X"), Term::integer(1)]),
        cache_call("hash_get", [Term::atom("k"), var("V")]),
        cache_call("hash_get", [Term::atom("missing"), var("M")]),
        cache_call("hash_size", [var("N")]),
    ]);

    // the stored value keeps the variable it was put with.
    assert_eq!(
        machine.run_query_to_vec(query),
        Ok(vec![LeafAnswer::from_bindings([
            ("M", Term::List(vec![])),
            ("N", Term::integer(1)),
            ("V", call("f", [var("_A")])),
            ("X", Term::integer(1)),
        ])])
    );

    // the alias outlives the query that created it.
    let query = cache_call("hash_get", [Term::atom("k"), var("V")]);
    assert_eq!(answers_for(&mut machine, query, "V"), Ok(vec![call("f", [var("_A")])]));
}

#[test]
fn hash_table_operations() {
    let mut machine = Machine::default();

    let query = with_cache([
        cache_call("hash_put", [Term::atom("a"), Term::integer(1)]),
        cache_call("hash_put", [Term::atom("b"), Term::integer(2)]),
        cache_call("hash_put", [Term::atom("a"), Term::integer(3)]),
        cache_call("hash_keys", [var("Keys")]),
        cache_call("hash_get", [Term::atom("a"), var("A")]),
    ]);

    assert_eq!(
        machine.run_query_to_vec(query),
        Ok(vec![LeafAnswer::from_bindings([
            ("A", Term::integer(3)),
            ("Keys", Term::list([Term::atom("a"), Term::atom("b")])),
        ])])
    );

    let query = cache_call("hash_contains_key", [Term::atom("b")]);
    assert_eq!(machine.run_query_to_vec(query), Ok(vec![LeafAnswer::True]));

    let query = Term::conjunction([
        cache_call("hash_remove", [Term::atom("b")]),
        cache_call("hash_remove", [Term::atom("nothing")]),
        cache_call("hash_size", [var("N")]),
    ]);
    assert_eq!(answers_for(&mut machine, query, "N"), Ok(vec![Term::integer(1)]));

    let query = cache_call("hash_contains_key", [Term::atom("b")]);
    assert_eq!(machine.run_query_to_vec(query), Ok(vec![LeafAnswer::False]));

    let query = Term::conjunction([
        call("hash_clear", [Term::atom("cache")]),
        cache_call("hash_keys", [var("Keys")]),
    ]);
    assert_eq!(answers_for(&mut machine, query, "Keys"), Ok(vec![Term::List(vec![])]));
}

#[test]
fn hash_contents_survive_backtracking() {
    let mut machine = Machine::default();

    // (new_hash(_, [alias(cache)]), hash_put(cache, k, v), fail ; hash_get(cache, k, V))
    let query = Term::disjunction([
        with_cache([
            cache_call("hash_put", [Term::atom("k"), Term::atom("v")]),
            Term::atom("fail"),
        ]),
        cache_call("hash_get", [Term::atom("k"), var("V")]),
    ]);

    assert_eq!(answers_for(&mut machine, query, "V"), Ok(vec![Term::atom("v")]));
}

#[test]
fn hash_tables_by_handle() {
    let mut machine = Machine::default();

    let query = Term::conjunction([
        call("new_hash", [var("H"), Term::List(vec![])]),
        call("hash_put", [var("H"), Term::integer(1), Term::atom("one")]),
        call("hash_get", [var("H"), Term::integer(1), var("V")]),
    ]);

    let answers = machine.run_query_to_vec(query).unwrap();

    match &answers[..] {
        [LeafAnswer::LeafAnswer { bindings, .. }] => {
            assert_eq!(bindings.get("V"), Some(&Term::atom("one")));
            assert!(matches!(bindings.get("H"), Some(Term::Foreign(handle)) if handle.is_hash_table()));
        }
        answers => panic!("unexpected answers {:?}", answers),
    }

    assert!(machine.registries().hashes.is_empty());
}

#[test]
fn close_hash_releases_the_alias() {
    let mut machine = Machine::default();

    let query = with_cache([cache_call("hash_put", [Term::atom("k"), Term::atom("v")])]);
    assert_eq!(machine.run_query_to_vec(query), Ok(vec![LeafAnswer::True]));

    let query = call("close_hash", [Term::atom("cache")]);
    assert_eq!(machine.run_query_to_vec(query), Ok(vec![LeafAnswer::True]));

    assert_eq!(
        error_of(&mut machine, cache_call("hash_size", [var("N")])),
        "error(existence_error(hash,cache),context(hash_size/2,1))"
    );

    // the alias is free again.
    let query = with_cache([cache_call("hash_size", [var("N")])]);
    assert_eq!(answers_for(&mut machine, query, "N"), Ok(vec![Term::integer(0)]));
}

#[test]
fn hash_errors() {
    let mut machine = Machine::default();

    let query = with_cache([]);
    assert_eq!(machine.run_query_to_vec(query.clone()), Ok(vec![LeafAnswer::True]));

    assert_eq!(
        error_of(&mut machine, query),
        "error(permission_error(create,hash,alias(cache)),context(new_hash/2,2))"
    );

    assert_eq!(
        error_of(
            &mut machine,
            call("new_hash", [var("H"), Term::list([call("size", [Term::integer(3)])])])
        ),
        "error(domain_error(hash_option,size(3)),context(new_hash/2,2))"
    );

    assert_eq!(
        error_of(&mut machine, call("new_hash", [var("H"), Term::atom("foo")])),
        "error(type_error(list,foo),context(new_hash/2,2))"
    );

    assert_eq!(
        error_of(&mut machine, cache_call("hash_put", [var("K"), Term::integer(1)])),
        "error(instantiation_error,context(hash_put/3,2))"
    );
    assert_eq!(
        error_of(&mut machine, cache_call("hash_get", [var("K"), var("V")])),
        "error(instantiation_error,context(hash_get/3,2))"
    );
    assert_eq!(
        error_of(&mut machine, cache_call("hash_contains_key", [var("K")])),
        "error(instantiation_error,context(hash_contains_key/2,2))"
    );

    assert_eq!(
        error_of(&mut machine, call("hash_size", [Term::integer(7), var("N")])),
        "error(domain_error(hash_or_alias,7),context(hash_size/2,1))"
    );

    // a failed unification of the handle releases the alias.
    let query = call(
        "new_hash",
        [Term::atom("taken"), Term::list([call("alias", [Term::atom("other")])])],
    );
    assert_eq!(machine.run_query_to_vec(query), Ok(vec![LeafAnswer::False]));
    assert!(!machine.registries().hashes.contains(Atom::from("other")));
}

#[derive(Debug, Default)]
struct Counter {
    count: i64,
}

impl ForeignValue for Counter {
    fn type_name(&self) -> &'static str {
        "counter"
    }

    fn get_field(&self, field: &str) -> Result<Term, ForeignError> {
        match field {
            "count" => Ok(Term::integer(self.count)),
            _ => Err(ForeignError::NoSuchField {
                type_name: self.type_name().to_owned(),
                field: field.to_owned(),
            }),
        }
    }

    fn set_field(&mut self, field: &str, value: Term) -> Result<(), ForeignError> {
        match (field, value) {
            ("count", Term::Integer(n)) => {
                self.count = n;
                Ok(())
            }
            ("count", value) => Err(ForeignError::FieldType {
                field: field.to_owned(),
                value: value.to_string(),
            }),
            _ => Err(ForeignError::NoSuchField {
                type_name: self.type_name().to_owned(),
                field: field.to_owned(),
            }),
        }
    }
}

#[test]
fn foreign_object_fields() {
    let mut machine = Machine::default();

    let handle = machine
        .add_object(Counter::default(), Some(Atom::from("counter")))
        .unwrap();

    let query = Term::conjunction([
        call("set_field", [Term::atom("counter"), Term::atom("count"), Term::integer(7)]),
        call("get_field", [Term::atom("counter"), Term::atom("count"), var("C")]),
    ]);

    assert_eq!(answers_for(&mut machine, query, "C"), Ok(vec![Term::integer(7)]));
    assert_eq!(handle.downcast_with(|counter: &mut Counter| counter.count), Some(7));

    // the handle itself resolves as well.
    let cell = HeapCellValue::Foreign(handle.clone());
    let c = machine.new_var();
    let goal = Goal::builtin(BuiltinType::GetField, &[cell, atom("count"), c.clone()], Goal::succeed());

    assert_eq!(solutions_of(&mut machine, goal, &c), Ok(vec![Term::integer(7)]));
}

#[test]
fn foreign_faults_carry_the_error() {
    let mut machine = Machine::default();

    machine
        .add_object(Counter::default(), Some(Atom::from("counter")))
        .unwrap();

    let query = call("get_field", [Term::atom("counter"), Term::atom("size"), var("S")]);
    let ball = machine.run_query_to_vec(query).unwrap_err();

    let fault = foreign_fault(&ball).expect("a foreign fault");
    let object = fault.lock();

    match &*object {
        ForeignObject::Fault(ForeignError::NoSuchField { type_name, field }) => {
            assert_eq!(type_name, "counter");
            assert_eq!(field, "size");
        }
        object => panic!("unexpected object {:?}", object),
    }

    drop(object);

    let query = call("set_field", [Term::atom("counter"), Term::atom("count"), Term::atom("x")]);
    let ball = machine.run_query_to_vec(query).unwrap_err();

    let fault = foreign_fault(&ball).unwrap();
    let object = fault.lock();

    assert!(matches!(&*object, ForeignObject::Fault(ForeignError::FieldType { .. })));
    drop(object);

    assert_eq!(
        error_of(&mut machine, call("get_field", [Term::atom("nobody"), Term::atom("count"), var("C")])),
        "error(existence_error(object,nobody),context(get_field/3,1))"
    );
    assert_eq!(
        error_of(&mut machine, call("get_field", [Term::atom("counter"), var("F"), var("C")])),
        "error(instantiation_error,context(get_field/3,2))"
    );
}
