//! Predicates compiled by hand into goal objects, the way a compiler
//! targeting the engine emits them.

use cafe_prolog::*;

use std::rc::Rc;

pub(crate) fn atom(name: &str) -> HeapCellValue {
    HeapCellValue::Atom(Atom::from(name))
}

pub(crate) fn int(n: i64) -> HeapCellValue {
    HeapCellValue::Fixnum(n)
}

pub(crate) fn key(name: &str, arity: usize) -> PredicateKey {
    (Atom::from(name), arity)
}

pub(crate) fn unify_goal(a: HeapCellValue, b: HeapCellValue, cont: GoalRef) -> GoalRef {
    Goal::builtin(BuiltinType::Unify, &[a, b], cont)
}

/// A machine with the predicates of this module installed.
pub(crate) fn machine_with_program(builder: MachineBuilder) -> Machine {
    let mut machine = builder.build();

    machine.define_predicate("p", 1, p);
    machine.define_predicate("q", 1, q);
    machine.define_predicate("r", 1, r);
    machine.define_predicate("member", 2, member);
    machine.define_predicate("app", 3, app);
    machine.define_predicate("nrev", 2, nrev);
    machine.define_predicate("loop", 0, looping);

    machine
}

/// Runs `goal` and reads `cell` at each solution.
pub(crate) fn solutions_of(
    machine: &mut Machine,
    goal: GoalRef,
    cell: &HeapCellValue,
) -> Result<Vec<Term>, Term> {
    let mut solutions = machine.run_goal(goal);
    let mut terms = vec![];

    while let Some(solution) = solutions.next() {
        solution?;
        terms.push(solutions.read_term(cell.clone())?);
    }

    Ok(terms)
}

/// The binding of `var` in each answer of `query`.
pub(crate) fn answers_for(machine: &mut Machine, query: Term, var: &str) -> Result<Vec<Term>, Term> {
    let mut terms = vec![];

    for answer in machine.run_query(query) {
        match answer? {
            LeafAnswer::LeafAnswer { bindings, .. } => {
                terms.extend(bindings.get(var).cloned());
            }
            LeafAnswer::Exception(ball) => return Err(ball),
            LeafAnswer::True | LeafAnswer::False => {}
        }
    }

    Ok(terms)
}

// p(X) :- X = a, fail.
// p(X) :- X = b.
pub(crate) fn p(args: Vec<HeapCellValue>, cont: GoalRef) -> GoalRef {
    let x = args[0].clone();

    Goal::try_clauses([
        unify_goal(x.clone(), atom("a"), Goal::fail()),
        unify_goal(x, atom("b"), cont),
    ])
}

// q(X) :- X = 1, !.
// q(X) :- X = 2.
pub(crate) fn q(args: Vec<HeapCellValue>, cont: GoalRef) -> GoalRef {
    Goal::closure(key("q", 1), args, cont, |machine, args, cont| {
        let b0 = machine.set_b0();
        let x = args[0].clone();

        Ok(Step::Continue(Goal::try_clauses([
            unify_goal(x.clone(), int(1), Goal::cut(b0, cont.clone())),
            unify_goal(x, int(2), cont.clone()),
        ])))
    })
}

// r(X) :- q(X).
// r(3).
pub(crate) fn r(args: Vec<HeapCellValue>, cont: GoalRef) -> GoalRef {
    let x = args[0].clone();

    Goal::try_clauses([q(vec![x.clone()], cont.clone()), unify_goal(x, int(3), cont)])
}

// member(X, [X|_]).
// member(X, [_|T]) :- member(X, T).
pub(crate) fn member(args: Vec<HeapCellValue>, cont: GoalRef) -> GoalRef {
    Goal::closure(key("member", 2), args, cont, |machine, args, cont| {
        let head = machine.new_var();
        let tail = machine.new_var();
        let cell = machine.put_list([head.clone()], tail.clone());

        unify_or_fail!(machine, args[1].clone(), cell);

        Ok(Step::Continue(Goal::try_clauses([
            unify_goal(args[0].clone(), head, cont.clone()),
            member(vec![args[0].clone(), tail], cont.clone()),
        ])))
    })
}

// app([], L, L).
// app([H|T], L, [H|R]) :- app(T, L, R).
pub(crate) fn app(args: Vec<HeapCellValue>, cont: GoalRef) -> GoalRef {
    Goal::closure(key("app", 3), args, cont, |machine, args, cont| {
        let nil_clause = |cont: &GoalRef| {
            Goal::closure(key("app", 3), vec![], cont.clone(), {
                let args = args.to_vec();
                move |machine, _, cont| {
                    unify_or_fail!(machine, args[0].clone(), atom("[]"));
                    unify_or_fail!(machine, args[1].clone(), args[2].clone());
                    Ok(Step::Continue(cont.clone()))
                }
            })
        };

        let cons_clause = |cont: &GoalRef| {
            Goal::closure(key("app", 3), vec![], cont.clone(), {
                let args = args.to_vec();
                move |machine, _, cont| {
                    let h = machine.new_var();
                    let t = machine.new_var();
                    let r = machine.new_var();

                    let list = machine.put_list([h.clone()], t.clone());
                    unify_or_fail!(machine, args[0].clone(), list);

                    let result = machine.put_list([h], r.clone());
                    unify_or_fail!(machine, args[2].clone(), result);

                    Ok(Step::Continue(app(vec![t, args[1].clone(), r], cont.clone())))
                }
            })
        };

        // first argument indexing.
        let goal = match machine.deref(args[0].clone()) {
            HeapCellValue::Var(_) => Goal::try_clauses([nil_clause(cont), cons_clause(cont)]),
            HeapCellValue::Lis(_) => cons_clause(cont),
            _ => nil_clause(cont),
        };

        Ok(Step::Continue(goal))
    })
}

// nrev([], []).
// nrev([H|T], R) :- nrev(T, RT), app(RT, [H], R).
pub(crate) fn nrev(args: Vec<HeapCellValue>, cont: GoalRef) -> GoalRef {
    Goal::closure(key("nrev", 2), args, cont, |machine, args, cont| {
        let list = machine.deref(args[0].clone());

        if list.is_nil() {
            unify_or_fail!(machine, args[1].clone(), list);
            return Ok(Step::Continue(cont.clone()));
        }

        let h = machine.new_var();
        let t = machine.new_var();
        let cell = machine.put_list([h.clone()], t.clone());

        unify_or_fail!(machine, list, cell);

        let rt = machine.new_var();
        let singleton = machine.put_list([h], atom("[]"));
        let append = app(vec![rt.clone(), singleton, args[1].clone()], cont.clone());

        Ok(Step::Continue(nrev(vec![t, rt], append)))
    })
}

// loop :- loop.
pub(crate) fn looping(args: Vec<HeapCellValue>, cont: GoalRef) -> GoalRef {
    Goal::closure(key("loop", 0), args, cont, |_, _, cont| {
        Ok(Step::Continue(looping(vec![], cont.clone())))
    })
}

/// A goal raising `ball` when run.
pub(crate) fn raising(ball: Term, cont: GoalRef) -> GoalRef {
    Goal::closure(key("raise", 0), vec![], cont, move |_, _, _| {
        Err(MachineStub::new(ball.clone()))
    })
}

/// A goal counting how often it is entered before continuing.
pub(crate) fn counting(count: Rc<std::cell::Cell<usize>>, cont: GoalRef) -> GoalRef {
    Goal::closure(key("count", 0), vec![], cont, move |_, _, cont| {
        count.set(count.get() + 1);
        Ok(Step::Continue(cont.clone()))
    })
}

pub(crate) fn call(name: &str, args: impl IntoIterator<Item = Term>) -> Term {
    Term::compound(name, args)
}

pub(crate) fn var(name: &str) -> Term {
    Term::variable(name)
}

/// The printed error a query raises.
pub(crate) fn error_of(machine: &mut Machine, query: Term) -> String {
    match machine.run_query_to_vec(query) {
        Err(ball) => ball.to_string(),
        Ok(answers) => panic!("expected an error, got {:?}", answers),
    }
}
