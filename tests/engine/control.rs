use crate::helper::*;

use cafe_prolog::*;

use std::cell::Cell;
use std::rc::Rc;

#[test]
fn backtracking_undoes_the_first_clause() {
    let mut machine = machine_with_program(MachineBuilder::new());

    let x = machine.new_var();
    let goal = p(vec![x.clone()], Goal::succeed());

    assert_eq!(solutions_of(&mut machine, goal, &x), Ok(vec![Term::atom("b")]));

    let query = Term::compound("p", [Term::variable("X")]);

    assert_eq!(
        machine.run_query_to_vec(query),
        Ok(vec![LeafAnswer::from_bindings([("X", Term::atom("b"))])])
    );
}

#[test]
fn alternatives_are_explored_in_order() {
    let mut machine = Machine::default();

    let x = machine.new_var();
    let clauses: Vec<_> = (1..=5)
        .map(|i| unify_goal(x.clone(), int(i), Goal::succeed()))
        .collect();

    let expected: Vec<_> = (1..=5).map(Term::integer).collect();

    assert_eq!(
        solutions_of(&mut machine, Goal::try_clauses(clauses), &x),
        Ok(expected)
    );
    assert_eq!(machine.machine_st().choice_point_depth(), 0);
}

#[test]
fn exhausted_frames_fail_into_the_enclosing_one() {
    let mut machine = Machine::default();

    let x = machine.new_var();
    let y = machine.new_var();

    // (X = 1 ; X = 2), (Y = a ; Y = b)
    let inner = Goal::try_clauses([
        unify_goal(y.clone(), atom("a"), Goal::succeed()),
        unify_goal(y.clone(), atom("b"), Goal::succeed()),
    ]);
    let outer = Goal::try_clauses([
        unify_goal(x.clone(), int(1), inner.clone()),
        unify_goal(x.clone(), int(2), inner),
    ]);

    let pair = machine.put_structure("-", &[x, y]);
    let answers: Vec<_> = solutions_of(&mut machine, outer, &pair)
        .unwrap()
        .into_iter()
        .map(|term| term.to_string())
        .collect();

    assert_eq!(answers, ["1-a", "1-b", "2-a", "2-b"]);
}

#[test]
fn cut_discards_only_the_activation_choice_points() {
    let mut machine = machine_with_program(MachineBuilder::new());

    let x = machine.new_var();
    assert_eq!(
        solutions_of(&mut machine, q(vec![x.clone()], Goal::succeed()), &x),
        Ok(vec![Term::integer(1)])
    );

    // the cut in q/1 leaves the choice point of r/1 alone.
    let x = machine.new_var();
    assert_eq!(
        solutions_of(&mut machine, r(vec![x.clone()], Goal::succeed()), &x),
        Ok(vec![Term::integer(1), Term::integer(3)])
    );
}

#[test]
fn discarded_alternatives_are_never_resumed() {
    let mut machine = Machine::default();

    let count = Rc::new(Cell::new(0));
    let x = machine.new_var();

    // p :- set_b0, (X = 1 ; count, X = 2 ; count, X = 3), !.
    let goal = Goal::closure(key("p", 0), vec![], Goal::succeed(), {
        let count = count.clone();
        let x = x.clone();

        move |machine, _, cont| {
            let b0 = machine.set_b0();
            let cut = Goal::cut(b0, cont.clone());

            Ok(Step::Continue(Goal::try_clauses([
                unify_goal(x.clone(), int(1), cut.clone()),
                counting(count.clone(), unify_goal(x.clone(), int(2), cut.clone())),
                counting(count.clone(), unify_goal(x.clone(), int(3), cut)),
            ])))
        }
    });

    let outer = Goal::try_clauses([goal, unify_goal(x.clone(), int(4), Goal::succeed())]);

    assert_eq!(
        solutions_of(&mut machine, outer, &x),
        Ok(vec![Term::integer(1), Term::integer(4)])
    );
    assert_eq!(count.get(), 0);
}

#[test]
fn cut_inside_call_is_local() {
    let mut machine = Machine::default();

    let answers = |machine: &mut Machine, query: Term| answers_for(machine, query, "X");

    let x_is = |n: i64| Term::compound("=", [Term::variable("X"), Term::integer(n)]);

    // (X = 1, ! ; X = 2)
    let query = Term::disjunction([Term::conjunction([x_is(1), Term::atom("!")]), x_is(2)]);
    assert_eq!(answers(&mut machine, query), Ok(vec![Term::integer(1)]));

    // (call(!), X = 1 ; X = 2)
    let query = Term::disjunction([
        Term::conjunction([Term::compound("call", [Term::atom("!")]), x_is(1)]),
        x_is(2),
    ]);
    assert_eq!(
        answers(&mut machine, query),
        Ok(vec![Term::integer(1), Term::integer(2)])
    );

    // (\+ fail, X = 1 ; X = 2) leaves the disjunction open.
    let query = Term::disjunction([
        Term::conjunction([Term::compound("\\+", [Term::atom("fail")]), x_is(1)]),
        x_is(2),
    ]);
    assert_eq!(
        answers(&mut machine, query),
        Ok(vec![Term::integer(1), Term::integer(2)])
    );
}

#[test]
fn unknown_sub_goals_are_reported_only_when_reached() {
    let mut machine = Machine::default();

    let query = Term::disjunction([
        Term::conjunction([Term::atom("fail"), Term::atom("undefined")]),
        Term::compound("=", [Term::variable("X"), Term::atom("ok")]),
    ]);

    assert_eq!(answers_for(&mut machine, query, "X"), Ok(vec![Term::atom("ok")]));

    let query = Term::conjunction([Term::atom("true"), Term::atom("undefined")]);

    assert_eq!(
        machine.run_query_to_vec(query).unwrap_err().to_string(),
        "error(existence_error(procedure,undefined/0),context(undefined/0,0))"
    );
}

#[test]
fn call_checks_its_goal() {
    let mut machine = Machine::default();

    let query = Term::compound("call", [Term::variable("G")]);
    assert_eq!(
        machine.run_query_to_vec(query).unwrap_err().to_string(),
        "error(instantiation_error,context(call/1,1))"
    );

    let query = Term::compound("call", [Term::integer(1)]);
    assert_eq!(
        machine.run_query_to_vec(query).unwrap_err().to_string(),
        "error(type_error(callable,1),context(call/1,1))"
    );

    let goal = Term::conjunction([Term::atom("true"), Term::integer(1)]);
    let query = Term::compound("call", [goal.clone()]);

    assert_eq!(
        machine.run_query_to_vec(query),
        Err(Term::compound(
            "error",
            [
                Term::compound("type_error", [Term::atom("callable"), goal]),
                Term::compound("context", [
                    Term::compound("/", [Term::atom("call"), Term::integer(1)]),
                    Term::integer(1),
                ]),
            ],
        ))
    );
}

// raise_it :- throw(my_error(42)).
fn raise_it(_: Vec<HeapCellValue>, cont: GoalRef) -> GoalRef {
    raising(Term::compound("my_error", [Term::integer(42)]), cont)
}

#[test]
fn catch_claims_a_matching_ball() {
    let mut machine = machine_with_program(MachineBuilder::new());
    machine.define_predicate("raise_it", 0, raise_it);

    let e = machine.new_var();
    let catcher = machine.put_structure("my_error", &[e.clone()]);

    // catch(raise_it, my_error(E), true)
    let goal = Goal::builtin(
        BuiltinType::Catch,
        &[atom("raise_it"), catcher, atom("true")],
        Goal::succeed(),
    );

    assert_eq!(solutions_of(&mut machine, goal, &e), Ok(vec![Term::integer(42)]));
    assert_eq!(machine.exception(), None);

    // a ball raised outside any catch surfaces unchanged.
    let ball = Term::compound("my_error", [Term::integer(42)]);
    let x = machine.new_var();

    assert_eq!(
        solutions_of(&mut machine, raise_it(vec![], Goal::succeed()), &x),
        Err(ball.clone())
    );
    assert_eq!(machine.exception(), Some(&ball));
}

#[test]
fn non_matching_catchers_rethrow() {
    let mut machine = Machine::default();

    // catch(catch(throw(inner), outer, true), B, true)
    let query = Term::compound(
        "catch",
        [
            Term::compound(
                "catch",
                [
                    Term::compound("throw", [Term::atom("inner")]),
                    Term::atom("outer"),
                    Term::atom("true"),
                ],
            ),
            Term::variable("B"),
            Term::atom("true"),
        ],
    );

    assert_eq!(answers_for(&mut machine, query, "B"), Ok(vec![Term::atom("inner")]));
}

#[test]
fn catch_is_transparent_to_backtracking() {
    let mut machine = machine_with_program(MachineBuilder::new());

    let list = Term::list([Term::integer(1), Term::integer(2), Term::integer(3)]);

    // catch(member(X, [1,2,3]), _, true)
    let query = Term::compound(
        "catch",
        [
            Term::compound("member", [Term::variable("X"), list.clone()]),
            Term::variable("_"),
            Term::atom("true"),
        ],
    );

    assert_eq!(
        answers_for(&mut machine, query, "X"),
        Ok(vec![Term::integer(1), Term::integer(2), Term::integer(3)])
    );

    // catch(member(X, [1,2,3]), _, true), X = 2, throw(found(X))
    let query = Term::conjunction([
        Term::compound(
            "catch",
            [
                Term::compound("member", [Term::variable("X"), list]),
                Term::variable("_"),
                Term::atom("true"),
            ],
        ),
        Term::compound("=", [Term::variable("X"), Term::integer(2)]),
        Term::compound("throw", [Term::compound("found", [Term::variable("X")])]),
    ]);

    // the catch no longer protects its continuation.
    assert_eq!(
        machine.run_query_to_vec(query),
        Ok(vec![LeafAnswer::Exception(Term::compound(
            "found",
            [Term::integer(2)]
        ))])
    );
}

#[test]
fn exception_slot_round_trip() {
    let mut machine = Machine::default();

    let ball = Term::compound(
        "error",
        [
            Term::compound("type_error", [Term::atom("atom"), Term::integer(1)]),
            Term::compound("context", [Term::atom("foo"), Term::integer(1)]),
        ],
    );

    let x = machine.new_var();
    assert_eq!(
        solutions_of(&mut machine, raising(ball.clone(), Goal::succeed()), &x),
        Err(ball.clone())
    );
    assert_eq!(machine.exception(), Some(&ball));

    // once claimed, the slot reads as empty.
    let query = Term::compound(
        "catch",
        [
            Term::compound("throw", [Term::atom("oops")]),
            Term::atom("oops"),
            Term::compound("$get_exception", [Term::variable("E")]),
        ],
    );

    assert_eq!(
        machine.run_query_to_vec(query),
        Ok(vec![LeafAnswer::from_bindings([("E", Term::List(vec![]))])])
    );
}

/// s(s(...s(Leaf)...)), `depth` levels deep.
fn nested(depth: usize, leaf: Term) -> Term {
    (0..depth).fold(leaf, |term, _| Term::compound("s", [term]))
}

/// The nesting depth of `term` under `s/1` and the term found at the bottom.
fn unnest(mut term: &Term) -> (usize, &Term) {
    let mut depth = 0;

    while let Term::Compound(name, args) = term {
        if name != "s" || args.len() != 1 {
            break;
        }

        depth += 1;
        term = &args[0];
    }

    (depth, term)
}

#[test]
fn deep_balls_cross_the_heap() {
    const DEPTH: usize = 200_000;

    let mut machine = Machine::default();

    // catch(throw(s(s(...s(X)...))), E, true)
    let query = Term::compound(
        "catch",
        [
            Term::compound("throw", [nested(DEPTH, Term::variable("X"))]),
            Term::variable("E"),
            Term::atom("true"),
        ],
    );

    let answers = machine.run_query_to_vec(query).unwrap();
    assert_eq!(answers.len(), 1);

    match &answers[0] {
        LeafAnswer::LeafAnswer { bindings, .. } => {
            let (depth, leaf) = unnest(&bindings["E"]);

            assert_eq!(depth, DEPTH);
            assert!(matches!(leaf, Term::Var(_)));
        }
        _ => panic!("expected bindings for E"),
    }

    // uncaught, the ball is copied into the exception slot as well.
    let query = Term::compound("throw", [nested(DEPTH, Term::atom("leaf"))]);
    let answers = machine.run_query_to_vec(query).unwrap();

    match &answers[..] {
        [LeafAnswer::Exception(ball)] => {
            assert_eq!(unnest(ball), (DEPTH, &Term::atom("leaf")));
            assert_eq!(machine.exception().map(unnest), Some((DEPTH, &Term::atom("leaf"))));
        }
        _ => panic!("expected one exception leaf"),
    }

    let printed = nested(DEPTH, Term::atom("leaf")).to_string();
    assert!(printed.starts_with("s(s(") && printed.ends_with("leaf))"));
    assert_eq!(printed.len(), DEPTH * 3 + 4);
}

#[test]
fn step_limit_abandons_the_query() {
    let mut machine = machine_with_program(MachineBuilder::new().with_step_limit(Some(1_000)));

    // catch(loop, _, true)
    let query = Term::compound(
        "catch",
        [Term::atom("loop"), Term::variable("_"), Term::atom("true")],
    );

    assert_eq!(
        machine.run_query_to_vec(query).unwrap_err().to_string(),
        "error(resource_error(steps),context(query/0,0))"
    );
    assert_eq!(machine.machine_st().choice_point_depth(), 0);

    // the limit is per query.
    assert_eq!(
        machine.run_query_to_vec(Term::atom("true")),
        Ok(vec![LeafAnswer::True])
    );
}

#[test]
fn naive_reverse() {
    let mut machine = machine_with_program(MachineBuilder::new());

    let list = Term::list((1..=30).map(Term::integer));
    let reversed = Term::list((1..=30).rev().map(Term::integer));

    let query = Term::compound("nrev", [list, Term::variable("R")]);

    assert_eq!(answers_for(&mut machine, query, "R"), Ok(vec![reversed]));

    // app/3 enumerates every split of a list.
    let query = Term::compound(
        "app",
        [
            Term::variable("X"),
            Term::variable("_"),
            Term::list([Term::atom("a"), Term::atom("b")]),
        ],
    );

    assert_eq!(
        answers_for(&mut machine, query, "X"),
        Ok(vec![
            Term::List(vec![]),
            Term::list([Term::atom("a")]),
            Term::list([Term::atom("a"), Term::atom("b")]),
        ])
    );
}
