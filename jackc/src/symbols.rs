/// Two-scope symbol table for Jack compilation.
///
/// Identifiers live in one of two nested scopes: `static` and `field`
/// declarations in the class scope, `argument` and `local` (`var`)
/// declarations in the subroutine scope. Each [`Kind`] has its own running
/// index counter, so the n-th declared variable of a kind lands in slot n-1
/// of the matching VM segment.
use std::collections::HashMap;

/// The storage class of a declared identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Static,
    Field,
    Argument,
    Local,
}

/// One resolved binding: declared type, storage class, and slot index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub ty: String,
    pub kind: Kind,
    pub index: u16,
}

/// Maps identifier names to [`Symbol`]s across the class and subroutine
/// scopes.
///
/// The class scope lives for the whole compilation unit; the subroutine
/// scope is cleared by [`start_subroutine`](Self::start_subroutine) at the
/// head of every subroutine. Lookups check the subroutine scope first, so a
/// parameter or local correctly shadows a class member of the same name.
#[derive(Debug, Default)]
pub struct SymbolTable {
    class_scope: HashMap<String, Symbol>,
    subroutine_scope: HashMap<String, Symbol>,
    static_count: u16,
    field_count: u16,
    argument_count: u16,
    local_count: u16,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new subroutine scope: clears the subroutine map and resets
    /// the argument/local counters. Class-scope bindings are untouched.
    pub fn start_subroutine(&mut self) {
        self.subroutine_scope.clear();
        self.argument_count = 0;
        self.local_count = 0;
    }

    /// Defines `name` with the given type and kind, assigning the next slot
    /// of that kind. Redefining a name in the same scope overwrites the
    /// previous binding (input is assumed valid; last write wins).
    pub fn define(&mut self, name: String, ty: String, kind: Kind) {
        let counter = self.counter_mut(kind);
        let index = *counter;
        *counter += 1;
        let scope = match kind {
            Kind::Static | Kind::Field => &mut self.class_scope,
            Kind::Argument | Kind::Local => &mut self.subroutine_scope,
        };
        scope.insert(name, Symbol { ty, kind, index });
    }

    /// Number of variables of `kind` defined so far in its scope.
    pub fn var_count(&self, kind: Kind) -> u16 {
        match kind {
            Kind::Static => self.static_count,
            Kind::Field => self.field_count,
            Kind::Argument => self.argument_count,
            Kind::Local => self.local_count,
        }
    }

    /// Resolves `name`, subroutine scope first, class scope as fallback.
    ///
    /// `None` is not an error here: the compilation engine reads absence as
    /// "this identifier is a class name" when resolving call qualifiers.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.subroutine_scope
            .get(name)
            .or_else(|| self.class_scope.get(name))
    }

    pub fn kind_of(&self, name: &str) -> Option<Kind> {
        self.get(name).map(|sym| sym.kind)
    }

    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.get(name).map(|sym| sym.ty.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<u16> {
        self.get(name).map(|sym| sym.index)
    }

    fn counter_mut(&mut self, kind: Kind) -> &mut u16 {
        match kind {
            Kind::Static => &mut self.static_count,
            Kind::Field => &mut self.field_count,
            Kind::Argument => &mut self.argument_count,
            Kind::Local => &mut self.local_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn define(table: &mut SymbolTable, name: &str, ty: &str, kind: Kind) {
        table.define(name.to_string(), ty.to_string(), kind);
    }

    #[test]
    fn indices_count_up_per_kind() {
        let mut table = SymbolTable::new();
        define(&mut table, "a", "int", Kind::Field);
        define(&mut table, "b", "int", Kind::Field);
        define(&mut table, "c", "int", Kind::Static);
        define(&mut table, "d", "int", Kind::Local);

        assert_eq!(table.index_of("a"), Some(0));
        assert_eq!(table.index_of("b"), Some(1));
        assert_eq!(table.index_of("c"), Some(0));
        assert_eq!(table.index_of("d"), Some(0));
        assert_eq!(table.var_count(Kind::Field), 2);
        assert_eq!(table.var_count(Kind::Static), 1);
        assert_eq!(table.var_count(Kind::Local), 1);
    }

    #[test]
    fn lookup_prefers_subroutine_scope() {
        let mut table = SymbolTable::new();
        define(&mut table, "x", "int", Kind::Field);
        define(&mut table, "x", "Point", Kind::Argument);

        let sym = table.get("x").expect("x resolves");
        assert_eq!(sym.kind, Kind::Argument);
        assert_eq!(sym.ty, "Point");
        assert_eq!(sym.index, 0);
    }

    #[test]
    fn start_subroutine_resets_only_subroutine_scope() {
        let mut table = SymbolTable::new();
        define(&mut table, "count", "int", Kind::Field);
        define(&mut table, "i", "int", Kind::Argument);
        define(&mut table, "sum", "int", Kind::Local);

        table.start_subroutine();

        assert_eq!(table.var_count(Kind::Argument), 0);
        assert_eq!(table.var_count(Kind::Local), 0);
        assert_eq!(table.get("i"), None);
        assert_eq!(table.get("sum"), None);
        // Class scope survives.
        assert_eq!(table.kind_of("count"), Some(Kind::Field));
        assert_eq!(table.var_count(Kind::Field), 1);
    }

    #[test]
    fn field_shadow_reappears_after_reset() {
        let mut table = SymbolTable::new();
        define(&mut table, "x", "int", Kind::Field);
        define(&mut table, "x", "char", Kind::Local);
        assert_eq!(table.kind_of("x"), Some(Kind::Local));

        table.start_subroutine();
        assert_eq!(table.kind_of("x"), Some(Kind::Field));
    }

    #[test]
    fn redefinition_overwrites_but_still_counts() {
        let mut table = SymbolTable::new();
        define(&mut table, "x", "int", Kind::Local);
        define(&mut table, "x", "char", Kind::Local);

        let sym = table.get("x").expect("x resolves");
        assert_eq!(sym.ty, "char");
        assert_eq!(sym.index, 1);
        assert_eq!(table.var_count(Kind::Local), 2);
    }

    #[test]
    fn absence_is_none_not_a_crash() {
        let table = SymbolTable::new();
        assert_eq!(table.get("Output"), None);
        assert_eq!(table.kind_of("Output"), None);
        assert_eq!(table.type_of("Output"), None);
        assert_eq!(table.index_of("Output"), None);
    }
}
