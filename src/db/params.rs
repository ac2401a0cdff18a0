//! Positional parameter binding.

use crate::models::QueryParam;
use sqlx::MySql;
use sqlx::mysql::MySqlArguments;
use sqlx::query::Query;
use sqlx::types::Json;
use tracing::trace;

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    param: &'q QueryParam,
) -> Query<'q, MySql, MySqlArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(Json(v)),
    }
}

/// Build a prepared query with every parameter bound in order.
pub(crate) fn bind_all<'q>(
    sql: &'q str,
    params: &'q [QueryParam],
) -> Query<'q, MySql, MySqlArguments> {
    if !params.is_empty() {
        // Values may be sensitive; only their kinds are logged.
        let kinds: Vec<&str> = params.iter().map(QueryParam::type_name).collect();
        trace!(?kinds, "Binding parameters");
    }
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| bind_mysql_param(query, param))
}
