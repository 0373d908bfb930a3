/// Interns an atom name.
#[macro_export]
macro_rules! atom {
    ($name:expr) => {
        $crate::atom_table::Atom::intern($name)
    };
}

macro_rules! is_char {
    ($s:expr) => {
        !$s.is_empty() && $s.chars().nth(1).is_none()
    };
}

/// Unifies two cells, returning `Ok(Step::Fail)` from the enclosing goal on
/// mismatch.
#[macro_export]
macro_rules! unify_or_fail {
    ($machine:expr, $a:expr, $b:expr) => {
        if !$machine.unify($a, $b) {
            return Ok($crate::machine::code::Step::Fail);
        }
    };
}

#[cfg(test)]
macro_rules! heap_atom {
    ($name:expr) => {
        $crate::types::HeapCellValue::Atom(atom!($name))
    };
}

macro_rules! empty_list_as_cell {
    () => {
        $crate::types::HeapCellValue::Atom(atom!("[]"))
    };
}
