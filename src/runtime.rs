//! 栈机参考执行器
//!
//! 直接解释代码生成器产出的 [`ClassModule`]：操作数栈、对象堆、
//! 沿父类链的虚分派，以及把 `print` 输出写到给定的 writer。
//! 标签在加载时一次性解析为指令下标。

use rustc_hash::FxHashMap;
use std::io::Write;
use std::rc::Rc;
use thiserror::Error;

use crate::codegen::instructions::{
    ClassModule, ENTRY_METHOD, Instruction, Label, MethodBody, MethodDescriptor, ROOT_CLASS,
    TypeDescriptor,
};

static FALL_THROUGH: Instruction = Instruction::Return;

/// 默认的最大调用深度
pub const DEFAULT_MAX_CALL_DEPTH: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("null dereference in {0}")]
    NullDereference(String),

    #[error("array index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i32, length: usize },

    #[error("negative array size {0}")]
    NegativeArraySize(i32),

    #[error("unknown class {0}")]
    UnknownClass(String),

    #[error("unknown method {class}.{method}")]
    UnknownMethod { class: String, method: String },

    #[error("unknown label {label} in {method}")]
    UnknownLabel { label: Label, method: String },

    #[error("operand stack underflow in {0}")]
    StackUnderflow(String),

    #[error("`this` is not available in the static entry routine")]
    StaticThis,

    #[error("expected {expected} in {method}")]
    InvalidOperand { expected: &'static str, method: String },

    #[error("call depth exceeded {0}")]
    CallDepthExceeded(usize),

    #[error("step budget of {0} instruction(s) exhausted")]
    StepBudgetExhausted(u64),

    #[error("failed to write output: {0}")]
    Output(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// 栈上的值：int（布尔值同样用 0/1 表示）或堆引用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    /// None 为 null
    Ref(Option<usize>),
}

impl Value {
    fn default_for(descriptor: &TypeDescriptor) -> Self {
        match descriptor {
            TypeDescriptor::Int | TypeDescriptor::Boolean => Value::Int(0),
            TypeDescriptor::IntArray | TypeDescriptor::Object(_) | TypeDescriptor::ObjectArray(_) => {
                Value::Ref(None)
            }
        }
    }
}

#[derive(Debug)]
enum HeapEntry<'m> {
    Object {
        class: &'m str,
        /// 以 (声明类, 字段名) 为键
        fields: FxHashMap<(&'m str, &'m str), Value>,
    },
    IntArray(Vec<i32>),
}

/// 标签已解析的例程
#[derive(Debug)]
struct Routine<'m> {
    body: &'m MethodBody,
    labels: FxHashMap<Label, usize>,
}

impl<'m> Routine<'m> {
    fn new(body: &'m MethodBody) -> Self {
        let labels = body
            .code
            .iter()
            .enumerate()
            .filter_map(|(index, instruction)| match instruction {
                Instruction::Mark(label) => Some((*label, index)),
                _ => None,
            })
            .collect();
        Self { body, labels }
    }
}

/// 调用帧
struct Frame<'m> {
    routine: Rc<Routine<'m>>,
    pc: usize,
    /// 静态入口没有接收者
    this: Option<Value>,
    args: Vec<Value>,
    locals: Vec<Value>,
    stack: Vec<Value>,
}

impl<'m> Frame<'m> {
    fn new(routine: Rc<Routine<'m>>, this: Option<Value>, args: Vec<Value>) -> Self {
        Self {
            locals: vec![Value::Int(0); usize::from(routine.body.max_locals)],
            routine,
            pc: 0,
            this,
            args,
            stack: Vec::new(),
        }
    }

    fn method(&self) -> String {
        self.routine.body.name.clone()
    }

    fn invalid(&self, expected: &'static str) -> RuntimeError {
        RuntimeError::InvalidOperand {
            expected,
            method: self.method(),
        }
    }

    fn pop(&mut self) -> RuntimeResult<Value> {
        match self.stack.pop() {
            Some(value) => Ok(value),
            None => Err(RuntimeError::StackUnderflow(self.method())),
        }
    }

    fn pop_int(&mut self) -> RuntimeResult<i32> {
        match self.pop()? {
            Value::Int(value) => Ok(value),
            Value::Ref(_) => Err(self.invalid("int operand")),
        }
    }

    /// 弹出非 null 引用
    fn pop_ref(&mut self) -> RuntimeResult<usize> {
        match self.pop()? {
            Value::Ref(Some(handle)) => Ok(handle),
            Value::Ref(None) => Err(RuntimeError::NullDereference(self.method())),
            Value::Int(_) => Err(self.invalid("reference operand")),
        }
    }

    /// 弹出栈顶的 count 个值，保持原顺序
    fn pop_many(&mut self, count: usize) -> RuntimeResult<Vec<Value>> {
        if self.stack.len() < count {
            return Err(RuntimeError::StackUnderflow(self.method()));
        }
        let at = self.stack.len() - count;
        Ok(self.stack.split_off(at))
    }

    fn jump(&self, label: Label) -> RuntimeResult<usize> {
        self.routine
            .labels
            .get(&label)
            .copied()
            .ok_or_else(|| RuntimeError::UnknownLabel {
                label,
                method: self.method(),
            })
    }
}

/// 例程按 (类, 方法名, 描述符) 查找
type RoutineKey<'m> = (&'m str, &'m str, &'m MethodDescriptor);

/// 参考执行器
pub struct Machine<'m, W: Write> {
    classes: FxHashMap<&'m str, &'m ClassModule>,
    routines: FxHashMap<RoutineKey<'m>, Rc<Routine<'m>>>,
    entry: &'m str,
    heap: Vec<HeapEntry<'m>>,
    out: W,
    step_budget: Option<u64>,
    steps: u64,
    max_call_depth: usize,
}

impl<'m, W: Write> Machine<'m, W> {
    /// 加载模块；第一个模块为入口类
    pub fn new(modules: &'m [ClassModule], out: W) -> RuntimeResult<Self> {
        let entry = modules
            .first()
            .map(|module| module.name.as_str())
            .ok_or_else(|| RuntimeError::UnknownClass("<entry>".to_string()))?;

        let mut classes = FxHashMap::default();
        let mut routines = FxHashMap::default();
        for module in modules {
            classes.insert(module.name.as_str(), module);
            for method in &module.methods {
                routines.insert(
                    (module.name.as_str(), method.name.as_str(), &method.descriptor),
                    Rc::new(Routine::new(method)),
                );
            }
        }
        log::debug!("loaded {} module(s), {} routine(s)", classes.len(), routines.len());

        Ok(Self {
            classes,
            routines,
            entry,
            heap: Vec::new(),
            out,
            step_budget: None,
            steps: 0,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        })
    }

    /// 限制执行的指令总数，None 为不限制
    pub fn with_step_budget(mut self, budget: Option<u64>) -> Self {
        self.step_budget = budget;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// 已执行的指令数
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// 执行入口类的静态入口例程
    pub fn run(&mut self) -> RuntimeResult<()> {
        let entry = self.entry;
        let body = self
            .class(entry)?
            .methods
            .iter()
            .find(|method| method.is_static && method.name == ENTRY_METHOD)
            .ok_or_else(|| RuntimeError::UnknownMethod {
                class: entry.to_string(),
                method: ENTRY_METHOD.to_string(),
            })?;
        let routine = self.routine(entry, &body.name, &body.descriptor)?;
        log::info!("running {}.{}{}", entry, body.name, body.descriptor);
        self.execute(routine, None, Vec::new())?;
        log::debug!("execution finished after {} step(s)", self.steps);
        self.out.flush().map_err(|e| RuntimeError::Output(e.to_string()))
    }

    fn class(&self, name: &str) -> RuntimeResult<&'m ClassModule> {
        self.classes
            .get(name)
            .copied()
            .ok_or_else(|| RuntimeError::UnknownClass(name.to_string()))
    }

    fn routine(
        &self,
        class: &'m str,
        method: &'m str,
        descriptor: &'m MethodDescriptor,
    ) -> RuntimeResult<Rc<Routine<'m>>> {
        self.routines
            .get(&(class, method, descriptor))
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownMethod {
                class: class.to_string(),
                method: format!("{}{}", method, descriptor),
            })
    }

    /// 从运行时类出发沿父类链查找名字和描述符都相同的方法
    fn dispatch(
        &self,
        class: &'m str,
        method: &'m str,
        descriptor: &'m MethodDescriptor,
    ) -> RuntimeResult<Rc<Routine<'m>>> {
        let mut current = class;
        for _ in 0..=self.classes.len() {
            if let Some(routine) = self.routines.get(&(current, method, descriptor)) {
                return Ok(Rc::clone(routine));
            }
            let module = self.class(current)?;
            if module.super_name == ROOT_CLASS {
                break;
            }
            current = module.super_name.as_str();
        }
        Err(RuntimeError::UnknownMethod {
            class: class.to_string(),
            method: format!("{}{}", method, descriptor),
        })
    }

    /// 从静态类型出发找到声明该字段的类
    fn field_key(&self, owner: &'m str, name: &'m str) -> RuntimeResult<(&'m str, &'m str)> {
        let mut current = owner;
        for _ in 0..=self.classes.len() {
            let module = self.class(current)?;
            if module.fields.iter().any(|field| field.name == name) {
                return Ok((current, name));
            }
            if module.super_name == ROOT_CLASS {
                break;
            }
            current = module.super_name.as_str();
        }
        Err(RuntimeError::UnknownClass(format!("{} (field {})", owner, name)))
    }

    fn allocate_object(&mut self, class: &'m str) -> RuntimeResult<Value> {
        let mut fields = FxHashMap::default();
        let mut current = class;
        for _ in 0..=self.classes.len() {
            let module = self.class(current)?;
            for field in &module.fields {
                fields.insert(
                    (module.name.as_str(), field.name.as_str()),
                    Value::default_for(&field.descriptor),
                );
            }
            if module.super_name == ROOT_CLASS {
                break;
            }
            current = module.super_name.as_str();
        }
        self.heap.push(HeapEntry::Object { class, fields });
        Ok(Value::Ref(Some(self.heap.len() - 1)))
    }

    fn object_class(&self, handle: usize, frame: &Frame<'m>) -> RuntimeResult<&'m str> {
        match self.heap.get(handle) {
            Some(HeapEntry::Object { class, .. }) => Ok(*class),
            _ => Err(frame.invalid("object reference")),
        }
    }

    fn object_fields(
        &mut self,
        handle: usize,
        frame: &Frame<'m>,
    ) -> RuntimeResult<&mut FxHashMap<(&'m str, &'m str), Value>> {
        match self.heap.get_mut(handle) {
            Some(HeapEntry::Object { fields, .. }) => Ok(fields),
            _ => Err(frame.invalid("object reference")),
        }
    }

    fn int_array(&mut self, handle: usize, frame: &Frame<'m>) -> RuntimeResult<&mut Vec<i32>> {
        match self.heap.get_mut(handle) {
            Some(HeapEntry::IntArray(values)) => Ok(values),
            _ => Err(frame.invalid("int[] reference")),
        }
    }

    fn tick(&mut self) -> RuntimeResult<()> {
        self.steps += 1;
        if let Some(budget) = self.step_budget {
            if self.steps > budget {
                return Err(RuntimeError::StepBudgetExhausted(budget));
            }
        }
        Ok(())
    }

    fn push_frame(&self, frames: &mut Vec<Frame<'m>>, frame: Frame<'m>) -> RuntimeResult<()> {
        if frames.len() >= self.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded(self.max_call_depth));
        }
        frames.push(frame);
        Ok(())
    }

    /// 在显式调用栈上解释执行，直到最外层例程返回
    fn execute(
        &mut self,
        routine: Rc<Routine<'m>>,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> RuntimeResult<Option<Value>> {
        let mut frames = Vec::new();
        self.push_frame(&mut frames, Frame::new(routine, this, args))?;

        while let Some(frame) = frames.last_mut() {
            let body: &'m MethodBody = frame.routine.body;
            // 落到例程末尾等同于 return
            let instruction = body.code.get(frame.pc).unwrap_or(&FALL_THROUGH);
            frame.pc += 1;
            self.tick()?;

            match instruction {
                Instruction::PushInt(value) => frame.stack.push(Value::Int(*value)),
                Instruction::LoadThis => {
                    let this = frame.this.ok_or(RuntimeError::StaticThis)?;
                    frame.stack.push(this);
                }
                Instruction::LoadArg(index) => {
                    let value = frame.args.get(usize::from(*index)).copied();
                    let value = value.ok_or_else(|| frame.invalid("argument"))?;
                    frame.stack.push(value);
                }
                Instruction::StoreArg(index) => {
                    let value = frame.pop()?;
                    match frame.args.get_mut(usize::from(*index)) {
                        Some(slot) => *slot = value,
                        None => return Err(frame.invalid("argument")),
                    }
                }
                Instruction::LoadLocal(slot) => {
                    let value = frame.locals.get(usize::from(*slot)).copied();
                    let value = value.ok_or_else(|| frame.invalid("local slot"))?;
                    frame.stack.push(value);
                }
                Instruction::StoreLocal(slot) => {
                    let value = frame.pop()?;
                    match frame.locals.get_mut(usize::from(*slot)) {
                        Some(local) => *local = value,
                        None => return Err(frame.invalid("local slot")),
                    }
                }
                Instruction::GetField { owner, name, descriptor } => {
                    let handle = frame.pop_ref()?;
                    let key = self.field_key(owner, name)?;
                    let fields = self.object_fields(handle, frame)?;
                    let value = fields.get(&key).copied().unwrap_or(Value::default_for(descriptor));
                    frame.stack.push(value);
                }
                Instruction::PutField { owner, name, .. } => {
                    let value = frame.pop()?;
                    let handle = frame.pop_ref()?;
                    let key = self.field_key(owner, name)?;
                    self.object_fields(handle, frame)?.insert(key, value);
                }
                Instruction::Add | Instruction::Sub | Instruction::Mul | Instruction::And | Instruction::Xor => {
                    let right = frame.pop_int()?;
                    let left = frame.pop_int()?;
                    let result = match instruction {
                        Instruction::Add => left.wrapping_add(right),
                        Instruction::Sub => left.wrapping_sub(right),
                        Instruction::Mul => left.wrapping_mul(right),
                        Instruction::And => left & right,
                        _ => left ^ right,
                    };
                    frame.stack.push(Value::Int(result));
                }
                Instruction::IfZero(label) => {
                    if frame.pop_int()? == 0 {
                        frame.pc = frame.jump(*label)?;
                    }
                }
                Instruction::IfCmpLt(label) => {
                    let right = frame.pop_int()?;
                    let left = frame.pop_int()?;
                    if left < right {
                        frame.pc = frame.jump(*label)?;
                    }
                }
                Instruction::Goto(label) => frame.pc = frame.jump(*label)?,
                Instruction::Mark(_) => {}
                Instruction::New(class) => {
                    let object = self.allocate_object(class)?;
                    frame.stack.push(object);
                }
                Instruction::Dup => {
                    let top = frame.pop()?;
                    frame.stack.push(top);
                    frame.stack.push(top);
                }
                Instruction::InvokeSpecial { owner, name, descriptor } => {
                    let args = frame.pop_many(descriptor.params.len())?;
                    let receiver = frame.pop()?;
                    if receiver == Value::Ref(None) {
                        return Err(RuntimeError::NullDereference(frame.method()));
                    }
                    // 根类构造器没有代码
                    if owner != ROOT_CLASS {
                        let routine = self.routine(owner, name, descriptor)?;
                        self.push_frame(&mut frames, Frame::new(routine, Some(receiver), args))?;
                    }
                }
                Instruction::InvokeVirtual { name, descriptor, .. } => {
                    let args = frame.pop_many(descriptor.params.len())?;
                    let handle = frame.pop_ref()?;
                    let class = self.object_class(handle, frame)?;
                    let routine = self.dispatch(class, name, descriptor)?;
                    let receiver = Some(Value::Ref(Some(handle)));
                    self.push_frame(&mut frames, Frame::new(routine, receiver, args))?;
                }
                Instruction::NewIntArray => {
                    let size = frame.pop_int()?;
                    let length = usize::try_from(size).map_err(|_| RuntimeError::NegativeArraySize(size))?;
                    self.heap.push(HeapEntry::IntArray(vec![0; length]));
                    frame.stack.push(Value::Ref(Some(self.heap.len() - 1)));
                }
                Instruction::ArrayLoad => {
                    let index = frame.pop_int()?;
                    let handle = frame.pop_ref()?;
                    let values = self.int_array(handle, frame)?;
                    let value = *element(values, index)?;
                    frame.stack.push(Value::Int(value));
                }
                Instruction::ArrayStore => {
                    let value = frame.pop_int()?;
                    let index = frame.pop_int()?;
                    let handle = frame.pop_ref()?;
                    let values = self.int_array(handle, frame)?;
                    *element(values, index)? = value;
                }
                Instruction::ArrayLength => {
                    let handle = frame.pop_ref()?;
                    let length = self.int_array(handle, frame)?.len();
                    let length = i32::try_from(length).map_err(|_| frame.invalid("array length"))?;
                    frame.stack.push(Value::Int(length));
                }
                Instruction::Print => {
                    let value = frame.pop_int()?;
                    writeln!(self.out, "{}", value).map_err(|e| RuntimeError::Output(e.to_string()))?;
                }
                Instruction::Return | Instruction::ReturnValue => {
                    let value = match instruction {
                        Instruction::ReturnValue => Some(frame.pop()?),
                        _ => None,
                    };
                    frames.pop();
                    match frames.last_mut() {
                        Some(caller) => caller.stack.extend(value),
                        None => return Ok(value),
                    }
                }
            }
        }

        Ok(None)
    }
}

fn element(values: &mut [i32], index: i32) -> RuntimeResult<&mut i32> {
    let length = values.len();
    usize::try_from(index)
        .ok()
        .and_then(|at| values.get_mut(at))
        .ok_or(RuntimeError::IndexOutOfBounds { index, length })
}
