//! 符号模型
//!
//! 所有作用域与符号集中存放在 [`SymbolTable`] 中，彼此之间只通过下标引用：
//! 父类链接与外层作用域链接都不拥有对方。作用域是封闭的三种变体
//! （类、方法、块），用模式匹配分派。

use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::OnceCell;
use std::fmt;

use crate::error::Span;

pub const INT: &str = "int";
pub const BOOLEAN: &str = "boolean";
pub const INT_ARRAY: &str = "int[]";

/// 作用域下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

/// 指向 `Scope::Klass` 的作用域下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KlassId(ScopeId);

impl KlassId {
    pub fn scope(self) -> ScopeId {
        self.0
    }
}

/// 符号下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

/// 方法在类符号表中的查找名：无重载，名字加空参数表
pub fn method_key(name: &str) -> String {
    format!("{}()", name)
}

/// 变量的存储分类，由代码生成器分配且只能分配一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// 形参，按调用顺序编号
    Parameter(u16),
    /// 局部变量槽位
    Local(u16),
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::Parameter(index) => write!(f, "arg {}", index),
            Storage::Local(slot) => write!(f, "local {}", slot),
        }
    }
}

/// 字段、形参或局部变量
#[derive(Debug)]
pub struct Symbol {
    pub name: String,
    /// 声明类型；类型名无法解析时为 None
    pub ty: Option<KlassId>,
    pub is_field: bool,
    pub span: Span,
    storage: OnceCell<Storage>,
}

impl Symbol {
    pub fn storage(&self) -> Option<Storage> {
        self.storage.get().copied()
    }

    /// 写入存储分类；已分配过时返回 Err(已有值)
    pub fn assign_storage(&self, storage: Storage) -> Result<(), Storage> {
        match self.storage.set(storage) {
            Ok(()) => Ok(()),
            Err(_) => Err(self.storage.get().copied().unwrap_or(storage)),
        }
    }

    /// 读取存储分类，未分配时用 `assign` 分配
    pub fn storage_or_assign(&self, assign: impl FnOnce() -> Storage) -> Storage {
        *self.storage.get_or_init(assign)
    }
}

/// 类（包括 int/boolean/int[] 内建伪类），同时是其成员的最外层作用域
#[derive(Debug)]
pub struct Klass {
    pub name: String,
    pub superclass: Option<KlassId>,
    pub builtin: bool,
    pub span: Span,
    fields: FxHashMap<String, SymbolId>,
    field_order: Vec<SymbolId>,
    methods: FxHashMap<String, ScopeId>,
    method_order: Vec<ScopeId>,
}

impl Klass {
    pub fn fields(&self) -> &[SymbolId] {
        &self.field_order
    }

    pub fn methods(&self) -> &[ScopeId] {
        &self.method_order
    }
}

/// 方法作用域
#[derive(Debug)]
pub struct Method {
    pub name: String,
    pub owner: KlassId,
    pub return_type: Option<KlassId>,
    pub span: Span,
    /// 形参，顺序即调用签名顺序
    params: Vec<SymbolId>,
    locals: FxHashMap<String, SymbolId>,
    initialized: FxHashSet<SymbolId>,
}

impl Method {
    pub fn params(&self) -> &[SymbolId] {
        &self.params
    }
}

/// 匿名块作用域：`{}`、if/else 分支、while 循环体
#[derive(Debug)]
pub struct Block {
    pub enclosing: ScopeId,
    initialized: FxHashSet<SymbolId>,
}

#[derive(Debug)]
pub enum Scope {
    Klass(Klass),
    Method(Method),
    Block(Block),
}

impl Scope {
    /// 词法上的外层作用域；类没有词法外层（其查找沿父类链）
    pub fn enclosing(&self) -> Option<ScopeId> {
        match self {
            Scope::Klass(_) => None,
            Scope::Method(method) => Some(method.owner.scope()),
            Scope::Block(block) => Some(block.enclosing),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Scope::Klass(klass) => &klass.name,
            Scope::Method(method) => &method.name,
            Scope::Block(_) => "local",
        }
    }
}

/// 全程序唯一的作用域/符号仓库
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    classes: FxHashMap<String, KlassId>,
    /// 用户声明的类（含入口类），按声明顺序
    class_order: Vec<KlassId>,
    int: KlassId,
    boolean: KlassId,
    int_array: KlassId,
}

impl SymbolTable {
    /// 创建只含内建伪类的符号表
    pub fn new() -> Self {
        let mut table = Self {
            scopes: Vec::new(),
            symbols: Vec::new(),
            classes: FxHashMap::default(),
            class_order: Vec::new(),
            int: KlassId(ScopeId(0)),
            boolean: KlassId(ScopeId(1)),
            int_array: KlassId(ScopeId(2)),
        };
        table.int = table.push_builtin(INT);
        table.boolean = table.push_builtin(BOOLEAN);
        table.int_array = table.push_builtin(INT_ARRAY);
        table
    }

    fn push_builtin(&mut self, name: &str) -> KlassId {
        let id = self.push_klass(name, Span::default(), true);
        self.classes.insert(name.to_string(), id);
        id
    }

    fn push_scope(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    fn push_klass(&mut self, name: &str, span: Span, builtin: bool) -> KlassId {
        KlassId(self.push_scope(Scope::Klass(Klass {
            name: name.to_string(),
            superclass: None,
            builtin,
            span,
            fields: FxHashMap::default(),
            field_order: Vec::new(),
            methods: FxHashMap::default(),
            method_order: Vec::new(),
        })))
    }

    fn push_symbol(&mut self, name: &str, ty: Option<KlassId>, is_field: bool, span: Span) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            name: name.to_string(),
            ty,
            is_field,
            span,
            storage: OnceCell::new(),
        });
        id
    }

    pub fn int(&self) -> KlassId {
        self.int
    }

    pub fn boolean(&self) -> KlassId {
        self.boolean
    }

    pub fn int_array(&self) -> KlassId {
        self.int_array
    }

    /// 注册用户类；同名类已存在时返回 Err(已有的类)
    pub fn declare_class(&mut self, name: &str, span: Span) -> Result<KlassId, KlassId> {
        if let Some(&existing) = self.classes.get(name) {
            return Err(existing);
        }
        let id = self.push_klass(name, span, false);
        self.classes.insert(name.to_string(), id);
        self.class_order.push(id);
        Ok(id)
    }

    /// 创建不进入类表的类，用于承载重复声明的成员
    pub fn detached_class(&mut self, name: &str, span: Span) -> KlassId {
        self.push_klass(name, span, false)
    }

    pub fn class(&self, name: &str) -> Option<KlassId> {
        self.classes.get(name).copied()
    }

    /// 用户声明的类，按声明顺序
    pub fn user_classes(&self) -> &[KlassId] {
        &self.class_order
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    pub fn klass(&self, id: KlassId) -> &Klass {
        match self.scope(id.0) {
            Scope::Klass(klass) => klass,
            _ => unreachable!("KlassId always refers to a class scope"),
        }
    }

    fn klass_mut(&mut self, id: KlassId) -> &mut Klass {
        match self.scope_mut(id.0) {
            Scope::Klass(klass) => klass,
            _ => unreachable!("KlassId always refers to a class scope"),
        }
    }

    pub fn method(&self, id: ScopeId) -> Option<&Method> {
        match self.scope(id) {
            Scope::Method(method) => Some(method),
            _ => None,
        }
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn klass_name(&self, id: KlassId) -> &str {
        &self.klass(id).name
    }

    /// 诊断用类型名
    pub fn type_name(&self, ty: Option<KlassId>) -> String {
        ty.map_or_else(|| "<unknown>".to_string(), |id| self.klass_name(id).to_string())
    }

    pub fn set_superclass(&mut self, klass: KlassId, superclass: Option<KlassId>) {
        self.klass_mut(klass).superclass = superclass;
    }

    /// 父类链（不含自身）。最多走完全部作用域，防止在有环的模型上死循环
    pub fn ancestors(&self, klass: KlassId) -> impl Iterator<Item = KlassId> + '_ {
        let mut current = self.klass(klass).superclass;
        let mut remaining = self.scopes.len();
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            let next = current?;
            current = self.klass(next).superclass;
            Some(next)
        })
    }

    /// 父类链是否回到自身
    pub fn is_cyclic(&self, klass: KlassId) -> bool {
        self.ancestors(klass).any(|ancestor| ancestor == klass)
    }

    /// 自反传递的子类关系
    pub fn is_instance_of(&self, klass: KlassId, other: KlassId) -> bool {
        klass == other || self.ancestors(klass).any(|ancestor| ancestor == other)
    }

    /// 在类中定义方法作用域；同名方法已存在时返回 Err(已有方法)
    pub fn declare_method(
        &mut self,
        owner: KlassId,
        name: &str,
        return_type: Option<KlassId>,
        span: Span,
    ) -> Result<ScopeId, ScopeId> {
        let key = method_key(name);
        if let Some(&existing) = self.klass(owner).methods.get(&key) {
            return Err(existing);
        }
        let id = self.detached_method(owner, name, return_type, span);
        let klass = self.klass_mut(owner);
        klass.methods.insert(key, id);
        klass.method_order.push(id);
        Ok(id)
    }

    /// 创建不登记到类中的方法作用域，用于承载重复声明的方法体
    pub fn detached_method(
        &mut self,
        owner: KlassId,
        name: &str,
        return_type: Option<KlassId>,
        span: Span,
    ) -> ScopeId {
        self.push_scope(Scope::Method(Method {
            name: name.to_string(),
            owner,
            return_type,
            span,
            params: Vec::new(),
            locals: FxHashMap::default(),
            initialized: FxHashSet::default(),
        }))
    }

    pub fn new_block(&mut self, enclosing: ScopeId) -> ScopeId {
        self.push_scope(Scope::Block(Block {
            enclosing,
            initialized: FxHashSet::default(),
        }))
    }

    /// 追加形参；同名形参已存在时返回 Err(已有符号)
    pub fn define_parameter(
        &mut self,
        method: ScopeId,
        name: &str,
        ty: Option<KlassId>,
        span: Span,
    ) -> Result<SymbolId, SymbolId> {
        if let Some(existing) = self.lookup_locally(method, name) {
            return Err(existing);
        }
        let id = self.push_symbol(name, ty, false, span);
        if let Scope::Method(m) = self.scope_mut(method) {
            m.params.push(id);
        }
        Ok(id)
    }

    /// 在作用域中定义字段或局部变量；块作用域委托给外层。
    /// 只与本作用域已定义的名字冲突（不查父类链）。
    pub fn define(
        &mut self,
        scope: ScopeId,
        name: &str,
        ty: Option<KlassId>,
        span: Span,
    ) -> Result<SymbolId, SymbolId> {
        if let Scope::Block(block) = self.scope(scope) {
            let enclosing = block.enclosing;
            return self.define(enclosing, name, ty, span);
        }
        if let Some(existing) = self.lookup_locally(scope, name) {
            return Err(existing);
        }

        let is_field = matches!(self.scope(scope), Scope::Klass(_));
        let id = self.push_symbol(name, ty, is_field, span);
        match self.scope_mut(scope) {
            Scope::Klass(klass) => {
                klass.fields.insert(name.to_string(), id);
                klass.field_order.push(id);
            }
            Scope::Method(method) => {
                method.locals.insert(name.to_string(), id);
            }
            Scope::Block(_) => unreachable!("blocks delegate definitions outward"),
        }
        Ok(id)
    }

    /// 只在当前作用域内查找（块作用域委托给外层）
    pub fn lookup_locally(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        match self.scope(scope) {
            Scope::Klass(klass) => klass.fields.get(name).copied(),
            Scope::Method(method) => method
                .params
                .iter()
                .copied()
                .find(|&param| self.symbol(param).name == name)
                .or_else(|| method.locals.get(name).copied()),
            Scope::Block(block) => self.lookup_locally(block.enclosing, name),
        }
    }

    /// 由内向外查找；到达类作用域后沿父类链继续
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        match self.scope(scope) {
            Scope::Klass(_) => {
                let klass = KlassId(scope);
                std::iter::once(klass)
                    .chain(self.ancestors(klass))
                    .find_map(|k| self.klass(k).fields.get(name).copied())
            }
            Scope::Method(method) => self
                .lookup_locally(scope, name)
                .or_else(|| self.lookup(method.owner.scope(), name)),
            Scope::Block(block) => self.lookup(block.enclosing, name),
        }
    }

    /// 在类及其祖先中按名字查找方法，最近的声明优先
    pub fn lookup_method(&self, klass: KlassId, name: &str) -> Option<ScopeId> {
        let key = method_key(name);
        std::iter::once(klass)
            .chain(self.ancestors(klass))
            .find_map(|k| self.klass(k).methods.get(&key).copied())
    }

    /// 作用域所属的最内层类
    pub fn enclosing_klass(&self, scope: ScopeId) -> KlassId {
        match self.scope(scope) {
            Scope::Klass(_) => KlassId(scope),
            Scope::Method(method) => method.owner,
            Scope::Block(block) => self.enclosing_klass(block.enclosing),
        }
    }

    /// 记录符号在当前作用域已初始化；类作用域中的字段总视为已初始化
    pub fn initialize(&mut self, scope: ScopeId, symbol: SymbolId) {
        match self.scope_mut(scope) {
            Scope::Klass(_) => {}
            Scope::Method(method) => {
                method.initialized.insert(symbol);
            }
            Scope::Block(block) => {
                block.initialized.insert(symbol);
            }
        }
    }

    /// 直接在该作用域中初始化的符号
    pub fn initialized_set(&self, scope: ScopeId) -> FxHashSet<SymbolId> {
        match self.scope(scope) {
            Scope::Klass(_) => FxHashSet::default(),
            Scope::Method(method) => method.initialized.clone(),
            Scope::Block(block) => block.initialized.clone(),
        }
    }

    /// 沿作用域链判断符号是否已初始化；形参与字段总是已初始化
    pub fn is_initialized(&self, scope: ScopeId, symbol: SymbolId) -> bool {
        match self.scope(scope) {
            Scope::Klass(_) => self.symbol(symbol).is_field,
            Scope::Method(method) => {
                method.initialized.contains(&symbol)
                    || method.params.contains(&symbol)
                    || self.is_initialized(method.owner.scope(), symbol)
            }
            Scope::Block(block) => {
                block.initialized.contains(&symbol) || self.is_initialized(block.enclosing, symbol)
            }
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
