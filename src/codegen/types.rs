//! 类型描述符映射
use crate::error::{MjResult, codegen_error};
use crate::types::{KlassId, ScopeId};
use super::context::CodeGenerator;
use super::instructions::{MethodDescriptor, TypeDescriptor};

impl<'a> CodeGenerator<'a> {
    /// 把类映射为基本类型、数组或对象描述符
    pub(super) fn descriptor(&self, ty: Option<KlassId>) -> MjResult<TypeDescriptor> {
        let table = self.table();
        let ty = ty.ok_or_else(|| codegen_error("unresolved type reached code generation"))?;
        Ok(if ty == table.int() {
            TypeDescriptor::Int
        } else if ty == table.boolean() {
            TypeDescriptor::Boolean
        } else if ty == table.int_array() {
            TypeDescriptor::IntArray
        } else {
            TypeDescriptor::Object(table.klass_name(ty).to_string())
        })
    }

    pub(super) fn method_descriptor(&self, method: ScopeId) -> MjResult<MethodDescriptor> {
        let table = self.table();
        let method = table
            .method(method)
            .ok_or_else(|| codegen_error("method scope expected"))?;
        let params = method
            .params()
            .iter()
            .map(|&param| self.descriptor(table.symbol(param).ty))
            .collect::<MjResult<Vec<_>>>()?;
        Ok(MethodDescriptor {
            params,
            ret: Some(self.descriptor(method.return_type)?),
        })
    }
}
