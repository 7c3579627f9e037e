use crate::{PropertyList, RepositoryInfo, ServerError, ServerErrorItem, SvnError};

use super::SvnItem;

/// Parses a `( ( name:string value:string ) ... )` property list.
///
/// Entries that do not have that shape are skipped.
pub(crate) fn parse_proplist(item: &SvnItem) -> Result<PropertyList, SvnError> {
    let entries = item
        .as_list()
        .ok_or_else(|| SvnError::Protocol("proplist not a list".into()))?;
    let mut props = PropertyList::new();
    for entry in entries {
        if let Some([name, value, ..]) = entry.as_list()
            && let (Some(name), Some(value)) = (name.as_str(), value.as_bytes())
        {
            props.insert(name.to_string(), value.to_vec());
        }
    }
    Ok(props)
}

pub(crate) fn parse_repos_info(params: &[SvnItem]) -> Result<RepositoryInfo, SvnError> {
    let uuid = params
        .first()
        .ok_or_else(|| SvnError::Protocol("repos-info params empty".into()))?
        .as_str()
        .ok_or_else(|| SvnError::Protocol("repos-info uuid not a string".into()))?
        .to_string();
    let root_url = match params.get(1) {
        Some(item) => item
            .as_str()
            .ok_or_else(|| SvnError::Protocol("repos-info root url not a string".into()))?
            .to_string(),
        None => String::new(),
    };
    let capabilities = match params.get(2) {
        Some(item) => item
            .as_list()
            .ok_or_else(|| SvnError::Protocol("repos-info caps not a list".into()))?
            .iter()
            .filter_map(|c| c.as_word().map(str::to_string))
            .collect(),
        None => Vec::new(),
    };
    Ok(RepositoryInfo {
        uuid,
        root_url,
        capabilities,
    })
}

/// Parses the error list of a `failure` response.
///
/// Each entry is `( apr-err:number message:string file:string line:number )`.
pub(crate) fn parse_server_error(items: &[SvnItem]) -> ServerError {
    let chain = items
        .iter()
        .filter_map(|item| match item.as_list() {
            Some([code, message, file, line, ..]) => Some(ServerErrorItem {
                code: code.as_u64().unwrap_or(0),
                message: lossy_string(message).filter(|m| !m.is_empty()),
                file: lossy_string(file).filter(|f| !f.is_empty()),
                line: line.as_u64(),
            }),
            _ => None,
        })
        .collect();

    ServerError {
        context: None,
        chain,
    }
}

fn lossy_string(item: &SvnItem) -> Option<String> {
    match item {
        SvnItem::String(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        SvnItem::Word(word) => Some(word.clone()),
        _ => None,
    }
}

#[derive(Debug)]
pub(crate) struct GetFileResponseParams {
    pub(crate) checksum: Option<String>,
    pub(crate) rev: u64,
    pub(crate) props: PropertyList,
}

/// Parses `( ( ?checksum ) rev:number props:proplist ... )`.
pub(crate) fn parse_get_file_response_params(
    params: &[SvnItem],
) -> Result<GetFileResponseParams, SvnError> {
    let [checksum, rev, props, ..] = params else {
        return Err(SvnError::Protocol("get-file response too short".into()));
    };

    let checksum = match checksum {
        SvnItem::List(items) => items.first().and_then(|i| i.as_str()),
        other => other.as_str(),
    }
    .map(str::to_string);
    let rev = rev
        .as_u64()
        .ok_or_else(|| SvnError::Protocol("get-file rev not a number".into()))?;
    let props = parse_proplist(props)?;

    Ok(GetFileResponseParams {
        checksum,
        rev,
        props,
    })
}
