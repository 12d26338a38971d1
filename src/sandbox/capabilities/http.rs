/*!
 * http Capability
 * Outbound requests, installed only when the build enables network access
 */

use super::fail;
use crate::sandbox::registry::CapabilityContext;
use crate::security::{HttpResponse, NetworkError};
use mlua::{IntoLuaMulti, Lua, MultiValue, Result as LuaResult, Table, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) fn open(lua: &Lua, context: &Arc<CapabilityContext>) -> LuaResult<Option<Value>> {
    if context.network.is_none() {
        return Ok(None);
    }

    let http = lua.create_table()?;

    let ctx = Arc::clone(context);
    http.set(
        "request",
        lua.create_function(move |lua, options: Table| {
            let url: String = options.get("url")?;
            let method: Option<String> = options.get("method")?;
            let headers: Option<Table> = options.get("headers")?;
            let body: Option<mlua::String> = options.get("body")?;
            perform(lua, &ctx, method.as_deref().unwrap_or("GET"), &url, headers, body)
        })?,
    )?;

    let ctx = Arc::clone(context);
    http.set(
        "get",
        lua.create_function(move |lua, (url, headers): (String, Option<Table>)| {
            perform(lua, &ctx, "GET", &url, headers, None)
        })?,
    )?;

    let ctx = Arc::clone(context);
    http.set(
        "post",
        lua.create_function(
            move |lua, (url, body, headers): (String, mlua::String, Option<Table>)| {
                perform(lua, &ctx, "POST", &url, headers, Some(body))
            },
        )?,
    )?;

    Ok(Some(Value::Table(http)))
}

fn perform(
    lua: &Lua,
    context: &CapabilityContext,
    method: &str,
    url: &str,
    headers: Option<Table>,
    body: Option<mlua::String>,
) -> LuaResult<MultiValue> {
    context.ensure_running()?;

    let Some(access) = context.network.as_ref() else {
        return fail(lua, NetworkError::Disabled);
    };

    let mut request_headers = Vec::new();
    if let Some(headers) = headers {
        for pair in headers.pairs::<String, String>() {
            request_headers.push(pair?);
        }
    }
    let body = body.map(|b| b.as_bytes().to_vec());

    match access.fetch(method, url, request_headers, body) {
        Ok(response) => response_table(lua, response)?.into_lua_multi(lua),
        Err(e) => fail(lua, e),
    }
}

/// `{ status = n, headers = { name = value }, body = bytes }`
fn response_table(lua: &Lua, response: HttpResponse) -> LuaResult<Table> {
    // repeated headers are folded into one comma separated value
    let mut folded: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in response.headers {
        match folded.entry(name.to_ascii_lowercase()) {
            Entry::Occupied(mut existing) => {
                let existing = existing.get_mut();
                existing.push_str(", ");
                existing.push_str(&value);
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }

    let table = lua.create_table()?;
    table.set("status", response.status)?;
    table.set("headers", lua.create_table_from(folded)?)?;
    table.set("body", lua.create_string(&response.body)?)?;
    Ok(table)
}
