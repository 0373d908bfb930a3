//! The builtin predicates.

use crate::atom_table::*;
use crate::machine::code::*;
use crate::machine::foreign::*;
use crate::machine::lib_machine::Term;
use crate::machine::machine_errors::*;
use crate::machine::registry::AliasRegistry;
use crate::machine::streams::*;
use crate::machine::Machine;
use crate::types::*;

use tracing::debug;

use std::io::Write;
use std::rc::Rc;

/// The direction a stream builtin moves bytes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamDirection {
    Input,
    Output,
}

impl StreamDirection {
    #[inline]
    fn permission(self) -> Permission {
        match self {
            StreamDirection::Input => Permission::InputStream,
            StreamDirection::Output => Permission::OutputStream,
        }
    }
}

impl Machine {
    /// Executes a builtin on its argument cells.
    pub(crate) fn system_call(
        &mut self,
        ty: BuiltinType,
        args: &[HeapCellValue],
        cont: &GoalRef,
    ) -> CallResult {
        match ty {
            BuiltinType::True => Ok(Step::Continue(cont.clone())),
            BuiltinType::Fail => Ok(Step::Fail),
            BuiltinType::Unify => {
                unify_or_fail!(self, args[0].clone(), args[1].clone());
                Ok(Step::Continue(cont.clone()))
            }
            BuiltinType::Call => {
                let barrier = self.machine_st.current_barrier();
                let goal = self.meta_goal(args[0].clone(), barrier, cont.clone(), ty.key())?;

                Ok(Step::Continue(goal))
            }
            BuiltinType::Catch => self.catch(args, cont),
            BuiltinType::Throw => self.throw_ball(args[0].clone()),
            BuiltinType::GetException => {
                let ball = match self.machine_st.exception().cloned() {
                    Some(ball) => self.write_term(&ball),
                    None => empty_list_as_cell!(),
                };

                unify_or_fail!(self, args[0].clone(), ball);
                Ok(Step::Continue(cont.clone()))
            }
            BuiltinType::AtomChars => self.atom_chars(args, cont),
            BuiltinType::GetByte => self.get_byte(args, cont),
            BuiltinType::PutByte => self.put_byte(args, cont),
            BuiltinType::Close => self.close(args, cont),
            BuiltinType::NewHash => self.new_hash(args, cont),
            BuiltinType::HashPut => {
                let table = self.get_hash_or_alias(args[0].clone(), ty)?;
                let key = self.read_key(args[1].clone(), ty)?;
                let value = self.read_arg(args[2].clone(), ty, 3)?;

                table.with_hash_table(|table| table.put(key, value));
                Ok(Step::Continue(cont.clone()))
            }
            BuiltinType::HashGet => {
                let table = self.get_hash_or_alias(args[0].clone(), ty)?;
                let key = self.read_key(args[1].clone(), ty)?;

                let value = match table.with_hash_table(|table| table.get(&key).cloned()) {
                    Some(Some(value)) => self.write_term(&value),
                    _ => empty_list_as_cell!(),
                };

                unify_or_fail!(self, args[2].clone(), value);
                Ok(Step::Continue(cont.clone()))
            }
            BuiltinType::HashRemove => {
                let table = self.get_hash_or_alias(args[0].clone(), ty)?;
                let key = self.read_key(args[1].clone(), ty)?;

                table.with_hash_table(|table| table.remove(&key));
                Ok(Step::Continue(cont.clone()))
            }
            BuiltinType::HashContainsKey => {
                let table = self.get_hash_or_alias(args[0].clone(), ty)?;
                let key = self.read_key(args[1].clone(), ty)?;

                if table.with_hash_table(|table| table.contains_key(&key)) == Some(true) {
                    Ok(Step::Continue(cont.clone()))
                } else {
                    Ok(Step::Fail)
                }
            }
            BuiltinType::HashSize => {
                let table = self.get_hash_or_alias(args[0].clone(), ty)?;
                let size = table.with_hash_table(|table| table.len()).unwrap_or(0);

                unify_or_fail!(self, args[1].clone(), HeapCellValue::Fixnum(size as i64));
                Ok(Step::Continue(cont.clone()))
            }
            BuiltinType::HashKeys => {
                let table = self.get_hash_or_alias(args[0].clone(), ty)?;
                let keys = table
                    .with_hash_table(|table| table.keys().cloned().collect::<Vec<_>>())
                    .unwrap_or_default();

                let keys: Vec<_> = keys.iter().map(|key| self.write_term(key)).collect();
                let list = self.machine_st.heap.put_list(keys, empty_list_as_cell!());

                unify_or_fail!(self, args[1].clone(), list);
                Ok(Step::Continue(cont.clone()))
            }
            BuiltinType::HashClear => {
                let table = self.get_hash_or_alias(args[0].clone(), ty)?;

                table.with_hash_table(|table| table.clear());
                Ok(Step::Continue(cont.clone()))
            }
            BuiltinType::CloseHash => {
                let table = self.get_hash_or_alias(args[0].clone(), ty)?;
                let aliases = self.registries.hashes.unregister_handle(&table);

                debug!(handle = %table, aliases = aliases.len(), "close_hash");

                table.with_hash_table(|table| table.clear());
                Ok(Step::Continue(cont.clone()))
            }
            BuiltinType::GetField => self.get_field(args, cont),
            BuiltinType::SetField => self.set_field(args, cont),
        }
    }

    #[inline]
    fn builtin_error(&self, err: MachineError, ty: BuiltinType, arg: usize) -> MachineStub {
        self.machine_st.error_form(err, ty.key(), arg)
    }

    /// Reads an argument as an owned term, reporting cycles against `arg`.
    fn read_arg(&self, cell: HeapCellValue, ty: BuiltinType, arg: usize) -> Result<Term, MachineStub> {
        self.machine_st
            .read_term(cell)
            .map_err(|err| self.builtin_error(err, ty, arg))
    }

    // hash keys are the second argument of every hash builtin.
    fn read_key(&self, cell: HeapCellValue, ty: BuiltinType) -> Result<Term, MachineStub> {
        let cell = self.deref(cell);

        if cell.is_var() {
            let err = self.machine_st.instantiation_error();
            return Err(self.builtin_error(err, ty, 2));
        }

        self.read_arg(cell, ty, 2)
    }

    fn catch(&mut self, args: &[HeapCellValue], cont: &GoalRef) -> CallResult {
        let prev_block = self.machine_st.block;

        self.machine_st.push_choice_point(Rc::new(Goal::CatchPoint {
            catcher: args[1].clone(),
            recovery: args[2].clone(),
            cont: cont.clone(),
        }));

        let block = self.machine_st.or_stack.len();
        self.machine_st.block = block;

        let exit = Rc::new(Goal::ExitCatch {
            prev_block,
            block,
            cont: cont.clone(),
        });

        let barrier = self.machine_st.current_barrier();
        let goal = self.meta_goal(args[0].clone(), barrier, exit, BuiltinType::Call.key())?;

        Ok(Step::Continue(goal))
    }

    /// Resumes a catch frame. With no ball the protected goal has failed
    /// back through the frame; otherwise the ball is unified with the
    /// catcher and either claimed or raised again past this frame.
    pub(crate) fn catch_point(
        &mut self,
        catcher: &HeapCellValue,
        recovery: &HeapCellValue,
        cont: &GoalRef,
    ) -> CallResult {
        let ball = match self.machine_st.ball.take() {
            Some(ball) => ball,
            None => return Ok(Step::Fail),
        };

        let mark = self.machine_st.trail_mark();
        let ball_cell = self.write_term(&ball);

        if self.unify(catcher.clone(), ball_cell) {
            debug!(ball = %ball, "caught");

            let barrier = self.machine_st.current_barrier();
            let goal = self.meta_goal(
                recovery.clone(),
                barrier,
                cont.clone(),
                BuiltinType::Call.key(),
            )?;

            Ok(Step::Continue(goal))
        } else {
            self.machine_st.undo_to(mark);
            Err(MachineStub::new(ball))
        }
    }

    fn throw_ball(&mut self, ball: HeapCellValue) -> CallResult {
        let ty = BuiltinType::Throw;
        let ball = self.deref(ball);

        if ball.is_var() {
            let err = self.machine_st.instantiation_error();
            return Err(self.builtin_error(err, ty, 1));
        }

        Err(MachineStub::new(self.read_arg(ball, ty, 1)?))
    }

    fn atom_chars(&mut self, args: &[HeapCellValue], cont: &GoalRef) -> CallResult {
        let ty = BuiltinType::AtomChars;

        match self.deref(args[0].clone()) {
            HeapCellValue::Atom(name) => {
                let chars: Vec<_> = name
                    .as_str()
                    .chars()
                    .map(|c| HeapCellValue::Atom(Atom::char_atom(c)))
                    .collect();

                let list = self.machine_st.heap.put_list(chars, empty_list_as_cell!());

                unify_or_fail!(self, args[1].clone(), list);
                Ok(Step::Continue(cont.clone()))
            }
            HeapCellValue::Var(_) => {
                let string = self.char_list_to_string(args[1].clone(), ty)?;

                unify_or_fail!(self, args[0].clone(), HeapCellValue::Atom(atom!(&*string)));
                Ok(Step::Continue(cont.clone()))
            }
            culprit => {
                let err = self.machine_st.type_error(ValidType::Atom, culprit);
                Err(self.builtin_error(err, ty, 1))
            }
        }
    }

    /// Collects a proper list of one-character atoms, the second argument
    /// of `ty`.
    fn char_list_to_string(&self, list: HeapCellValue, ty: BuiltinType) -> Result<String, MachineStub> {
        let heap = &self.machine_st.heap;
        let mut string = String::new();
        let mut cell = self.deref(list.clone());

        // a cyclic list is longer than the heap holding it.
        for _ in 0..=heap.cell_len() {
            match cell {
                HeapCellValue::Lis(l) => {
                    match self.deref(heap[l].clone()) {
                        HeapCellValue::Var(_) => {
                            let err = self.machine_st.instantiation_error();
                            return Err(self.builtin_error(err, ty, 2));
                        }
                        HeapCellValue::Atom(c) if c.is_char() => {
                            string.push_str(c.as_str());
                        }
                        culprit => {
                            let err = self.machine_st.type_error(ValidType::Character, culprit);
                            return Err(self.builtin_error(err, ty, 2));
                        }
                    }

                    cell = self.deref(heap[l + 1].clone());
                }
                HeapCellValue::Var(_) => {
                    let err = self.machine_st.instantiation_error();
                    return Err(self.builtin_error(err, ty, 2));
                }
                ref nil if nil.is_nil() => return Ok(string),
                _ => break,
            }
        }

        let err = self.machine_st.type_error(ValidType::List, list);
        Err(self.builtin_error(err, ty, 2))
    }

    /// Resolves an alias or a handle through `registry`.
    fn resolve_handle(
        &self,
        registry: &AliasRegistry,
        cell: HeapCellValue,
        domain: DomainErrorType,
        is_kind: fn(&ForeignHandle) -> bool,
        ty: BuiltinType,
    ) -> Result<ForeignHandle, MachineStub> {
        let cell = self.deref(cell);

        let err = match &cell {
            HeapCellValue::Var(_) => self.machine_st.instantiation_error(),
            HeapCellValue::Atom(alias) => match registry.lookup(*alias) {
                Some(handle) => return Ok(handle),
                None => self
                    .machine_st
                    .existence_error(ExistenceError::Alias(registry.kind(), *alias)),
            },
            HeapCellValue::Foreign(handle) if is_kind(handle) => return Ok(handle.clone()),
            _ => self.machine_st.domain_error(domain, cell.clone()),
        };

        Err(self.builtin_error(err, ty, 1))
    }

    pub(crate) fn get_stream_or_alias(
        &self,
        cell: HeapCellValue,
        ty: BuiltinType,
    ) -> Result<ForeignHandle, MachineStub> {
        let handle = self.resolve_handle(
            &self.registries.streams,
            cell.clone(),
            DomainErrorType::StreamOrAlias,
            ForeignHandle::is_stream,
            ty,
        )?;

        if handle.with_stream(|stream| stream.is_closed()) == Some(true) {
            let culprit = self.read_arg(cell, ty, 1)?;
            let err = self
                .machine_st
                .existence_error(ExistenceError::Resource(atom!("stream"), culprit));

            return Err(self.builtin_error(err, ty, 1));
        }

        Ok(handle)
    }

    pub(crate) fn get_hash_or_alias(
        &self,
        cell: HeapCellValue,
        ty: BuiltinType,
    ) -> Result<ForeignHandle, MachineStub> {
        self.resolve_handle(
            &self.registries.hashes,
            cell,
            DomainErrorType::HashOrAlias,
            ForeignHandle::is_hash_table,
            ty,
        )
    }

    pub(crate) fn get_object_or_alias(
        &self,
        cell: HeapCellValue,
        ty: BuiltinType,
    ) -> Result<ForeignHandle, MachineStub> {
        self.resolve_handle(
            &self.registries.objects,
            cell,
            DomainErrorType::ObjectOrAlias,
            ForeignHandle::is_value,
            ty,
        )
    }

    /// Checks that the stream can move bytes in `direction`. Byte builtins
    /// refuse text streams and, for input, streams already past their end
    /// whose end-of-file action is an error.
    fn check_stream_properties(
        &self,
        handle: &ForeignHandle,
        culprit: HeapCellValue,
        direction: StreamDirection,
        ty: BuiltinType,
    ) -> Result<(), MachineStub> {
        let refusal = handle.with_stream(|stream| {
            let permitted = match direction {
                StreamDirection::Input => stream.is_input_stream(),
                StreamDirection::Output => stream.is_output_stream(),
            };

            if !permitted {
                Some(atom!("stream"))
            } else if stream.options().stream_type != StreamType::Binary {
                Some(stream.options().stream_type.as_atom())
            } else if direction == StreamDirection::Input
                && stream.past_end_of_stream()
                && stream.options().eof_action == EOFAction::Error
            {
                Some(atom!("past_end_of_stream"))
            } else {
                None
            }
        });

        match refusal.flatten() {
            Some(type_atom) => {
                let err =
                    self.machine_st
                        .permission_error(direction.permission(), type_atom, culprit);
                Err(self.builtin_error(err, ty, 1))
            }
            None => Ok(()),
        }
    }

    fn get_byte(&mut self, args: &[HeapCellValue], cont: &GoalRef) -> CallResult {
        let ty = BuiltinType::GetByte;
        let handle = self.get_stream_or_alias(args[0].clone(), ty)?;

        match self.deref(args[1].clone()) {
            HeapCellValue::Var(_) => {}
            HeapCellValue::Fixnum(n) if (-1..=255).contains(&n) => {}
            HeapCellValue::Fixnum(_) => {
                let err = self.machine_st.representation_error(RepFlag::InByte);
                return Err(self.builtin_error(err, ty, 2));
            }
            culprit => {
                let err = self.machine_st.type_error(ValidType::InByte, culprit);
                return Err(self.builtin_error(err, ty, 2));
            }
        }

        self.check_stream_properties(&handle, args[0].clone(), StreamDirection::Input, ty)?;

        let byte = match handle.with_stream(|stream| stream.read_byte()) {
            Some(Ok(byte)) => byte,
            Some(Err(e)) => {
                let err = self.machine_st.foreign_error(e.into());
                return Err(self.builtin_error(err, ty, 1));
            }
            None => None,
        };

        let code = HeapCellValue::Fixnum(byte.map_or(-1, i64::from));

        unify_or_fail!(self, args[1].clone(), code);
        Ok(Step::Continue(cont.clone()))
    }

    fn put_byte(&mut self, args: &[HeapCellValue], cont: &GoalRef) -> CallResult {
        let ty = BuiltinType::PutByte;
        let handle = self.get_stream_or_alias(args[0].clone(), ty)?;

        let byte = match self.deref(args[1].clone()) {
            HeapCellValue::Var(_) => {
                let err = self.machine_st.instantiation_error();
                return Err(self.builtin_error(err, ty, 2));
            }
            HeapCellValue::Fixnum(n) => match u8::try_from(n) {
                Ok(byte) => byte,
                Err(_) => {
                    let err = self.machine_st.type_error(ValidType::Byte, HeapCellValue::Fixnum(n));
                    return Err(self.builtin_error(err, ty, 2));
                }
            },
            culprit => {
                let err = self.machine_st.type_error(ValidType::Byte, culprit);
                return Err(self.builtin_error(err, ty, 2));
            }
        };

        self.check_stream_properties(&handle, args[0].clone(), StreamDirection::Output, ty)?;

        if let Some(Err(e)) = handle.with_stream(|stream| stream.write_all(&[byte])) {
            let err = self.machine_st.foreign_error(e.into());
            return Err(self.builtin_error(err, ty, 1));
        }

        Ok(Step::Continue(cont.clone()))
    }

    fn close(&mut self, args: &[HeapCellValue], cont: &GoalRef) -> CallResult {
        let ty = BuiltinType::Close;
        let handle = self.get_stream_or_alias(args[0].clone(), ty)?;

        let is_standard = self.is_standard_handle(&handle)
            || handle.with_stream(|stream| stream.is_standard_stream()) == Some(true);

        if is_standard {
            debug!(handle = %handle, "close of a standard stream ignored");
            return Ok(Step::Continue(cont.clone()));
        }

        let aliases = self.registries.streams.unregister_handle(&handle);

        debug!(handle = %handle, aliases = aliases.len(), "close");

        if let Some(Err(e)) = handle.with_stream(|stream| stream.close()) {
            let err = self.machine_st.foreign_error(e.into());
            return Err(self.builtin_error(err, ty, 1));
        }

        Ok(Step::Continue(cont.clone()))
    }

    /// Parses the option list of `new_hash/2`, returning the alias if one
    /// is given. A later `alias/1` option replaces an earlier one.
    fn hash_options(&self, options: HeapCellValue) -> Result<Option<Atom>, MachineStub> {
        let ty = BuiltinType::NewHash;
        let heap = &self.machine_st.heap;

        let mut alias = None;
        let mut cell = self.deref(options.clone());

        for _ in 0..=heap.cell_len() {
            match cell {
                HeapCellValue::Lis(l) => {
                    let option = self.deref(heap[l].clone());

                    let err = match heap.name_and_arity(&option) {
                        _ if option.is_var() => self.machine_st.instantiation_error(),
                        Some((name, 1)) if name == atom!("alias") => {
                            match heap.arg(&option, 1).map(|arg| self.deref(arg)) {
                                Some(HeapCellValue::Atom(name)) => {
                                    alias = Some(name);
                                    cell = self.deref(heap[l + 1].clone());
                                    continue;
                                }
                                Some(HeapCellValue::Var(_)) => {
                                    self.machine_st.instantiation_error()
                                }
                                _ => self
                                    .machine_st
                                    .domain_error(DomainErrorType::HashOption, option),
                            }
                        }
                        _ => self
                            .machine_st
                            .domain_error(DomainErrorType::HashOption, option),
                    };

                    return Err(self.builtin_error(err, ty, 2));
                }
                HeapCellValue::Var(_) => {
                    let err = self.machine_st.instantiation_error();
                    return Err(self.builtin_error(err, ty, 2));
                }
                ref nil if nil.is_nil() => return Ok(alias),
                _ => break,
            }
        }

        let err = self.machine_st.type_error(ValidType::List, options);
        Err(self.builtin_error(err, ty, 2))
    }

    fn new_hash(&mut self, args: &[HeapCellValue], cont: &GoalRef) -> CallResult {
        let ty = BuiltinType::NewHash;
        let alias = self.hash_options(args[1].clone())?;

        let handle = ForeignHandle::new(ForeignObject::HashTable(TermHashTable::new()));

        self.register_alias(&self.registries.hashes, alias, &handle)
            .map_err(|err| self.builtin_error(err, ty, 2))?;

        if !self.unify(args[0].clone(), HeapCellValue::Foreign(handle.clone())) {
            if let Some(alias) = alias {
                self.registries.hashes.unregister_if(alias, &handle);
            }

            return Ok(Step::Fail);
        }

        Ok(Step::Continue(cont.clone()))
    }

    fn field_name(&self, cell: HeapCellValue, ty: BuiltinType) -> Result<Atom, MachineStub> {
        let err = match self.deref(cell) {
            HeapCellValue::Atom(name) => return Ok(name),
            HeapCellValue::Var(_) => self.machine_st.instantiation_error(),
            culprit => self.machine_st.type_error(ValidType::Atom, culprit),
        };

        Err(self.builtin_error(err, ty, 2))
    }

    fn get_field(&mut self, args: &[HeapCellValue], cont: &GoalRef) -> CallResult {
        let ty = BuiltinType::GetField;
        let object = self.get_object_or_alias(args[0].clone(), ty)?;
        let field = self.field_name(args[1].clone(), ty)?;

        let result = match &*object.lock() {
            ForeignObject::Value(value) => value.get_field(field.as_str()),
            _ => Err(ForeignError::Custom("not an object".to_owned())),
        };

        let value = match result {
            Ok(value) => self.write_term(&value),
            Err(fault) => {
                let err = self.machine_st.foreign_error(fault);
                return Err(self.builtin_error(err, ty, 2));
            }
        };

        unify_or_fail!(self, args[2].clone(), value);
        Ok(Step::Continue(cont.clone()))
    }

    fn set_field(&mut self, args: &[HeapCellValue], cont: &GoalRef) -> CallResult {
        let ty = BuiltinType::SetField;
        let object = self.get_object_or_alias(args[0].clone(), ty)?;
        let field = self.field_name(args[1].clone(), ty)?;
        let value = self.read_arg(args[2].clone(), ty, 3)?;

        let result = match &mut *object.lock() {
            ForeignObject::Value(target) => target.set_field(field.as_str(), value),
            _ => Err(ForeignError::Custom("not an object".to_owned())),
        };

        if let Err(fault) = result {
            let err = self.machine_st.foreign_error(fault);
            return Err(self.builtin_error(err, ty, 2));
        }

        Ok(Step::Continue(cont.clone()))
    }
}
