//! 动作调用规范推导
//!
//! 注册时读取动作的签名（参数名 / 类型 / 是否有默认值）与 describe 元数据，
//! 生成供 function-calling 模型使用的 CallSpecification。上下文参数不会出现在规范中。
//!
//! 类型映射：String / Boolean / Integer / Number 映射为同名 JSON 类型；
//! Other(t) 原样透传 t；未标注类型统一回退为 "string"。
//! 参数描述优先级：describe 元数据 > 签名声明的描述（typed 参数的字段文档）> 空字符串。
//! 函数描述优先级：describe 元数据 > 签名文档（去首尾空白）> null。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Index;

use schemars::schema::{InstanceType, Schema, SchemaObject, SingleOrVec};
use schemars::JsonSchema;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::core::SchemaError;

/// 未标注或无法映射的参数类型统一使用该类型
pub const FALLBACK_TYPE: &str = "string";

/// 参数声明类型
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamType {
    String,
    Boolean,
    Integer,
    Number,
    /// 保留的上下文标记：由调用方注入，不暴露给模型
    Context,
    /// 其它 JSON 类型名，原样透传（如 "array"）
    Other(String),
    Unannotated,
}

impl ParamType {
    /// 对应的 JSON Schema 类型；上下文参数返回 None
    pub fn schema_type(&self) -> Option<String> {
        match self {
            ParamType::String => Some("string".to_string()),
            ParamType::Boolean => Some("boolean".to_string()),
            ParamType::Integer => Some("integer".to_string()),
            ParamType::Number => Some("number".to_string()),
            ParamType::Context => None,
            ParamType::Other(t) => Some(t.clone()),
            ParamType::Unannotated => Some(FALLBACK_TYPE.to_string()),
        }
    }

    fn from_instance(t: InstanceType) -> Self {
        match t {
            InstanceType::String => ParamType::String,
            InstanceType::Boolean => ParamType::Boolean,
            InstanceType::Integer => ParamType::Integer,
            InstanceType::Number => ParamType::Number,
            InstanceType::Array => ParamType::Other("array".to_string()),
            InstanceType::Object => ParamType::Other("object".to_string()),
            InstanceType::Null => ParamType::Unannotated,
        }
    }

    fn from_schema_object(obj: &SchemaObject) -> Self {
        match &obj.instance_type {
            Some(SingleOrVec::Single(t)) => Self::from_instance(**t),
            Some(SingleOrVec::Vec(ts)) => ts
                .iter()
                .find(|t| **t != InstanceType::Null)
                .map(|t| Self::from_instance(*t))
                .unwrap_or(ParamType::Unannotated),
            None => ParamType::Unannotated,
        }
    }
}

/// 单个参数声明；default 为 None 表示必填
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: ParamType,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl Parameter {
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            ty,
            default: Some(default.into()),
            description: None,
        }
    }

    /// 上下文参数（位置固定为第一个实参，名字仅用于校验）
    pub fn context(name: impl Into<String>) -> Self {
        Self::required(name, ParamType::Context)
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn is_context(&self) -> bool {
        self.ty == ParamType::Context
    }
}

/// 动作签名：注册时一次性枚举的参数列表
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Signature {
    pub name: String,
    pub doc: Option<String>,
    pub params: Vec<Parameter>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            params: Vec::new(),
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// 是否声明了上下文参数（决定调用时是否注入 Context）
    pub fn accepts_context(&self) -> bool {
        self.params.iter().any(Parameter::is_context)
    }

    /// 从 typed 参数结构体的 schemars Schema 推导签名
    ///
    /// 不在 required 中的字段视为有默认值；字段文档作为参数描述，结构体文档作为函数文档。
    pub fn from_args<A: JsonSchema>(name: impl Into<String>) -> Result<Self, SchemaError> {
        let name = name.into();
        let root = schemars::schema_for!(A);
        let object = root
            .schema
            .object
            .as_ref()
            .ok_or_else(|| SchemaError::UnsupportedShape {
                action: name.clone(),
                reason: "argument type is not a JSON object".to_string(),
            })?;

        let params = object
            .properties
            .iter()
            .map(|(field, schema)| {
                let (ty, default, description) = match schema {
                    Schema::Object(obj) => {
                        let meta = obj.metadata.as_ref();
                        (
                            ParamType::from_schema_object(obj),
                            meta.and_then(|m| m.default.clone()),
                            meta.and_then(|m| m.description.clone()),
                        )
                    }
                    Schema::Bool(_) => (ParamType::Unannotated, None, None),
                };
                let default = if object.required.contains(field) {
                    None
                } else {
                    Some(default.unwrap_or(Value::Null))
                };
                Parameter {
                    name: field.clone(),
                    ty,
                    default,
                    description,
                }
            })
            .collect();

        Ok(Self {
            name,
            doc: root.schema.metadata.as_ref().and_then(|m| m.description.clone()),
            params,
        })
    }
}

/// describe 元数据：整体描述与逐参数描述，注册前附加在动作上
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Describe {
    description: Option<String>,
    params: HashMap<String, String>,
}

/// `describe("...").param("emoji", "...")`，不改变动作行为
pub fn describe(description: impl Into<String>) -> Describe {
    Describe::default().description(description)
}

impl Describe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// 参数描述会去掉首尾空白
    pub fn param(mut self, name: impl Into<String>, description: impl AsRef<str>) -> Self {
        self.params
            .insert(name.into(), description.as_ref().trim().to_string());
        self
    }

    /// 多次附加时后者覆盖前者的同名键
    pub fn merge(mut self, other: Describe) -> Self {
        if other.description.is_some() {
            self.description = other.description;
        }
        self.params.extend(other.params);
        self
    }

    pub fn function_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn param_description(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// 单个参数在规范中的描述
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

/// 参数表：保持签名声明顺序，序列化为 JSON 对象
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Properties(Vec<(String, PropertySpec)>);

impl Properties {
    pub fn get(&self, name: &str) -> Option<&PropertySpec> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, spec)| spec)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 同名覆盖并保持原位置，否则追加到末尾
    fn insert(&mut self, name: String, spec: PropertySpec) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = spec,
            None => self.0.push((name, spec)),
        }
    }
}

impl Index<&str> for Properties {
    type Output = PropertySpec;

    fn index(&self, name: &str) -> &PropertySpec {
        match self.get(name) {
            Some(spec) => spec,
            None => panic!("no property named '{name}'"),
        }
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, spec) in &self.0 {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

struct PropertiesVisitor;

impl<'de> Visitor<'de> for PropertiesVisitor {
    type Value = Properties;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of parameter name to property spec")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Properties, M::Error> {
        let mut props = Properties::default();
        while let Some((name, spec)) = access.next_entry::<String, PropertySpec>()? {
            props.insert(name, spec);
        }
        Ok(props)
    }
}

impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PropertiesVisitor)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParametersSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: Properties,
    pub required: Vec<String>,
}

/// 供 function-calling 模型消费的调用规范（JSON 形状固定）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSpecification {
    pub name: String,
    pub description: Option<String>,
    pub parameters: ParametersSpec,
}

impl CallSpecification {
    pub fn is_required(&self, param: &str) -> bool {
        self.parameters.required.iter().any(|r| r == param)
    }
}

/// 推导调用规范；签名不可用时返回 SchemaError
pub fn derive(
    signature: &Signature,
    metadata: Option<&Describe>,
) -> Result<CallSpecification, SchemaError> {
    let name = signature.name.trim();
    if name.is_empty() {
        return Err(SchemaError::MissingName);
    }

    let mut seen = HashSet::new();
    for p in &signature.params {
        if !seen.insert(p.name.as_str()) {
            return Err(SchemaError::DuplicateParameter {
                action: name.to_string(),
                param: p.name.clone(),
            });
        }
    }
    if signature.params.iter().filter(|p| p.is_context()).count() > 1 {
        return Err(SchemaError::MultipleContextParameters(name.to_string()));
    }

    let mut properties = Properties::default();
    let mut required = Vec::new();
    for p in signature.params.iter().filter(|p| !p.is_context()) {
        let Some(kind) = p.ty.schema_type() else {
            continue;
        };
        let description = metadata
            .and_then(|m| m.param_description(&p.name))
            .map(str::to_string)
            .or_else(|| p.description.as_ref().map(|d| d.trim().to_string()))
            .unwrap_or_default();
        properties.insert(p.name.clone(), PropertySpec { kind, description });
        if !p.has_default() {
            required.push(p.name.clone());
        }
    }

    let description = metadata
        .and_then(|m| m.function_description())
        .map(str::to_string)
        .or_else(|| signature.doc.as_ref().map(|d| d.trim().to_string()));

    Ok(CallSpecification {
        name: name.to_string(),
        description,
        parameters: ParametersSpec {
            kind: "object".to_string(),
            properties,
            required,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pedant_signature() -> Signature {
        Signature::new("test_func")
            .doc("  A func\n")
            .param(Parameter::required("a", ParamType::String))
            .param(Parameter::optional("b", ParamType::Boolean, false))
    }

    #[test]
    fn test_pedant_doc() {
        let meta = Describe::new().param("a", "CoolString").param("b", "BoldBool");
        let spec = derive(&pedant_signature(), Some(&meta)).unwrap();
        assert_eq!(spec.name, "test_func");
        assert_eq!(spec.description.as_deref(), Some("A func"));
        assert!(spec.is_required("a"));
        assert!(!spec.is_required("b"));
        let a = &spec.parameters.properties["a"];
        assert_eq!(a.kind, "string");
        assert_eq!(a.description, "CoolString");
        let b = &spec.parameters.properties["b"];
        assert_eq!(b.kind, "boolean");
        assert_eq!(b.description, "BoldBool");
    }

    #[test]
    fn test_explicit_description_beats_doc() {
        let sig = Signature::new("test_fn2")
            .doc("ignored")
            .param(Parameter::required("n", ParamType::Integer));
        let meta = describe("noop").param("n", "  hops\n ");
        let spec = derive(&sig, Some(&meta)).unwrap();
        assert_eq!(spec.description.as_deref(), Some("noop"));
        assert_eq!(spec.parameters.properties["n"].description, "hops");
        assert_eq!(spec.parameters.properties["n"].kind, "integer");
    }

    #[test]
    fn test_no_doc_no_metadata() {
        let sig = Signature::new("bare").param(Parameter::required("x", ParamType::Unannotated));
        let spec = derive(&sig, None).unwrap();
        assert_eq!(spec.description, None);
        assert_eq!(spec.parameters.properties["x"].kind, FALLBACK_TYPE);
        assert_eq!(spec.parameters.properties["x"].description, "");
    }

    #[test]
    fn test_other_type_passes_through() {
        let sig = Signature::new("fetch").param(Parameter::required(
            "paths",
            ParamType::Other("array".to_string()),
        ));
        let spec = derive(&sig, None).unwrap();
        assert_eq!(spec.parameters.properties["paths"].kind, "array");
    }

    #[test]
    fn test_context_parameter_is_hidden() {
        let sig = Signature::new("react")
            .param(Parameter::context("ctx"))
            .param(Parameter::required("emoji", ParamType::String));
        let meta = Describe::new().param("ctx", "should never show");
        let spec = derive(&sig, Some(&meta)).unwrap();
        assert!(sig.accepts_context());
        assert!(!spec.parameters.properties.contains_key("ctx"));
        assert!(!spec.is_required("ctx"));
        assert_eq!(spec.parameters.required, vec!["emoji".to_string()]);
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let err = derive(&Signature::new("   "), None).unwrap_err();
        assert_eq!(err, SchemaError::MissingName);
    }

    #[test]
    fn test_duplicate_and_multiple_context_rejected() {
        let dup = Signature::new("f")
            .param(Parameter::required("a", ParamType::String))
            .param(Parameter::required("a", ParamType::Boolean));
        assert!(matches!(
            derive(&dup, None),
            Err(SchemaError::DuplicateParameter { .. })
        ));

        let two_ctx = Signature::new("g")
            .param(Parameter::context("c1"))
            .param(Parameter::context("c2"));
        assert_eq!(
            derive(&two_ctx, None),
            Err(SchemaError::MultipleContextParameters("g".to_string()))
        );
    }

    #[test]
    fn test_required_order_follows_declaration() {
        let sig = Signature::new("f")
            .param(Parameter::required("z", ParamType::String))
            .param(Parameter::optional("m", ParamType::Number, 1.5))
            .param(Parameter::required("a", ParamType::String));
        let spec = derive(&sig, None).unwrap();
        assert_eq!(spec.parameters.required, vec!["z".to_string(), "a".to_string()]);
        let keys: Vec<_> = spec.parameters.properties.keys().collect();
        assert_eq!(keys, vec!["z", "m", "a"]);
    }

    #[test]
    fn test_properties_serialize_in_declaration_order() {
        let sig = Signature::new("f")
            .param(Parameter::required("zeta", ParamType::String))
            .param(Parameter::required("alpha", ParamType::Integer));
        let spec = derive(&sig, None).unwrap();
        let text = serde_json::to_string(&spec.parameters.properties).unwrap();
        assert_eq!(
            text,
            r#"{"zeta":{"type":"string","description":""},"alpha":{"type":"integer","description":""}}"#
        );

        let back: CallSpecification =
            serde_json::from_str(&serde_json::to_string(&spec).unwrap()).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_merge_describe() {
        let first = describe("one").param("a", "x");
        let second = Describe::new().param("a", "y").param("b", "z");
        let merged = first.merge(second);
        assert_eq!(merged.function_description(), Some("one"));
        assert_eq!(merged.param_description("a"), Some("y"));
        assert_eq!(merged.param_description("b"), Some("z"));
    }

    #[test]
    fn test_spec_json_shape() {
        let spec = derive(&pedant_signature(), None).unwrap();
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "test_func",
                "description": "A func",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "a": {"type": "string", "description": ""},
                        "b": {"type": "boolean", "description": ""}
                    },
                    "required": ["a"]
                }
            })
        );
    }

    /// Look up a city's weather.
    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct WeatherArgs {
        /// City name
        city: String,
        #[serde(default)]
        metric: bool,
        days: Option<u32>,
    }

    #[test]
    fn test_signature_from_typed_args() {
        let sig = Signature::from_args::<WeatherArgs>("weather").unwrap();
        assert_eq!(sig.doc.as_deref(), Some("Look up a city's weather."));
        let spec = derive(&sig, None).unwrap();
        assert_eq!(spec.parameters.required, vec!["city".to_string()]);
        assert_eq!(spec.parameters.properties["city"].kind, "string");
        assert_eq!(spec.parameters.properties["city"].description, "City name");
        assert_eq!(spec.parameters.properties["metric"].kind, "boolean");
        assert_eq!(spec.parameters.properties["days"].kind, "integer");
        let keys: Vec<_> = spec.parameters.properties.keys().collect();
        assert_eq!(keys, vec!["city", "metric", "days"]);
        assert!(!sig.accepts_context());
    }
}
