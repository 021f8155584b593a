use serde_json::Value as JsonValue;

/// Value bound to a `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// `text[]` path into the `jsonb` column.
    Path(Vec<String>),
    Text(String),
    /// Bound as `jsonb`.
    Json(JsonValue),
    Int(i64),
}

#[cfg(feature = "postgres")]
pub use pg::{PgParam, PgParamStore};

#[cfg(feature = "postgres")]
mod pg {
    use super::SqlParam;
    use tokio_postgres::types::{Json as PgJson, ToSql};

    pub struct PgParam(Box<dyn ToSql + Sync + Send>);

    impl PgParam {
        #[must_use]
        pub fn from_param(param: &SqlParam) -> Self {
            match param {
                SqlParam::Path(p) => Self(Box::new(p.clone())),
                SqlParam::Text(s) => Self(Box::new(s.clone())),
                SqlParam::Json(v) => Self(Box::new(PgJson(v.clone()))),
                SqlParam::Int(i) => Self(Box::new(*i)),
            }
        }
    }

    impl AsRef<dyn ToSql + Sync> for PgParam {
        fn as_ref(&self) -> &(dyn ToSql + Sync + 'static) {
            &*self.0
        }
    }

    pub struct PgParamStore {
        pub params: Vec<PgParam>,
    }

    impl PgParamStore {
        #[must_use]
        pub fn from_params(params: &[SqlParam]) -> Self {
            Self { params: params.iter().map(PgParam::from_param).collect() }
        }

        pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
            self.params.iter().map(|param| param.as_ref()).collect::<Vec<_>>()
        }
    }

}
