use hmac::{Hmac, Mac};
use reqwest::header::{HeaderValue, AUTHORIZATION, HOST};
use sha1::{Digest, Sha1};

use crate::upload::UploadError;

type HmacSha1 = Hmac<Sha1>;

/// COS 永久密钥
#[derive(Clone, PartialEq, Eq)]
pub struct CosCredentials {
    pub secret_id: String,
    pub secret_key: String,
}

impl std::fmt::Debug for CosCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosCredentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"******")
            .finish()
    }
}

impl CosCredentials {
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
        }
    }
}

/// 参与签名的头部：host、content-type、content-md5 以及所有 x-cos-*
fn is_signed_header(name: &str) -> bool {
    matches!(name, "host" | "content-type" | "content-md5") || name.starts_with("x-cos-")
}

fn hmac_sha1_hex(key: &[u8], data: &str) -> Result<String, UploadError> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|e| UploadError::InvalidInput(format!("HMAC key: {}", e)))?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn sha1_hex(data: &str) -> String {
    hex::encode(Sha1::digest(data.as_bytes()))
}

/// 小写 key、URL 编码 key/value 后按 key 排序，返回 (key 列表, key=value 串)
fn canonical_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> (String, String) {
    let mut encoded: Vec<(String, String)> = pairs
        .into_iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(&k.to_lowercase()).into_owned(),
                urlencoding::encode(v).into_owned(),
            )
        })
        .collect();
    encoded.sort();

    let keys = encoded
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let kvs = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    (keys, kvs)
}

/// 计算 XML API 的 Authorization 头
///
/// `path` 为未编码的对象路径，`params` 为请求的全部查询参数，`headers` 只需包含参与签名的头部。
/// 签名有效期为 `[start, end]`（Unix 秒）。
pub fn authorization(
    credentials: &CosCredentials,
    method: &str,
    path: &str,
    params: &[(&str, &str)],
    headers: &[(&str, &str)],
    start: i64,
    end: i64,
) -> Result<String, UploadError> {
    let key_time = format!("{};{}", start, end);
    let sign_key = hmac_sha1_hex(credentials.secret_key.as_bytes(), &key_time)?;

    let (param_list, param_string) = canonical_pairs(params.iter().copied());
    let (header_list, header_string) = canonical_pairs(headers.iter().copied());

    let http_string = format!(
        "{}\n{}\n{}\n{}\n",
        method.to_lowercase(),
        path,
        param_string,
        header_string
    );
    let string_to_sign = format!("sha1\n{}\n{}\n", key_time, sha1_hex(&http_string));
    let signature = hmac_sha1_hex(sign_key.as_bytes(), &string_to_sign)?;

    Ok(format!(
        "q-sign-algorithm=sha1&q-ak={}&q-sign-time={}&q-key-time={}&q-header-list={}&q-url-param-list={}&q-signature={}",
        credentials.secret_id, key_time, key_time, header_list, param_list, signature
    ))
}

/// 为已构建的请求补齐 Host 头并写入签名
pub fn sign_request(
    credentials: &CosCredentials,
    request: &mut reqwest::Request,
    expire_secs: u64,
) -> Result<(), UploadError> {
    let url = request.url().clone();
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(UploadError::InvalidInput(format!("请求地址缺少 host: {}", url)));
        }
    };
    let host_value = HeaderValue::from_str(&host)
        .map_err(|e| UploadError::InvalidInput(format!("非法 host {}: {}", host, e)))?;
    request.headers_mut().insert(HOST, host_value);

    let path = urlencoding::decode(url.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| url.path().to_string());
    let query: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let params: Vec<(&str, &str)> = query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    let mut header_values = Vec::new();
    for (name, value) in request.headers() {
        if !is_signed_header(name.as_str()) {
            continue;
        }
        let value = value
            .to_str()
            .map_err(|e| UploadError::InvalidInput(format!("头部 {} 无法签名: {}", name, e)))?;
        header_values.push((name.as_str().to_string(), value.to_string()));
    }
    let headers: Vec<(&str, &str)> = header_values
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let start = chrono::Utc::now().timestamp();
    let end = start + expire_secs as i64;
    let auth = authorization(
        credentials,
        request.method().as_str(),
        &path,
        &params,
        &headers,
        start,
        end,
    )?;

    let auth_value = HeaderValue::from_str(&auth)
        .map_err(|e| UploadError::InvalidInput(format!("非法签名: {}", e)))?;
    request.headers_mut().insert(AUTHORIZATION, auth_value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> CosCredentials {
        CosCredentials::new(
            "AKIDQjz3ltompVjBni5LitkWHFlFpwkn9U5q",
            "BQYIM75p8x0iWVFSIgqEKwFprpRSVHlz",
        )
    }

    #[test]
    fn test_authorization_format() -> Result<(), UploadError> {
        let auth = authorization(
            &credentials(),
            "PUT",
            "/exampleobject(腾讯云)",
            &[],
            &[
                ("Host", "examplebucket-1250000000.cos.ap-beijing.myqcloud.com"),
                ("Content-Type", "text/plain"),
                ("x-cos-acl", "private"),
            ],
            1557989151,
            1557996351,
        )?;

        let parts: Vec<&str> = auth.split('&').collect();
        assert_eq!(parts[0], "q-sign-algorithm=sha1");
        assert_eq!(parts[1], "q-ak=AKIDQjz3ltompVjBni5LitkWHFlFpwkn9U5q");
        assert_eq!(parts[2], "q-sign-time=1557989151;1557996351");
        assert_eq!(parts[3], "q-key-time=1557989151;1557996351");
        assert_eq!(parts[4], "q-header-list=content-type;host;x-cos-acl");
        assert_eq!(parts[5], "q-url-param-list=");
        assert!(parts[6].starts_with("q-signature="));
        assert_eq!(parts[6].len(), "q-signature=".len() + 40);
        Ok(())
    }

    #[test]
    fn test_authorization_signature() -> Result<(), UploadError> {
        let auth = authorization(
            &credentials(),
            "PUT",
            "/exampleobject(腾讯云)",
            &[],
            &[
                ("Content-Length", "13"),
                ("Content-MD5", "mQ/fVh815F3k6TAUm8m0eg=="),
                ("Content-Type", "text/plain"),
                ("Date", "Thu, 16 May 2019 03:15:06 GMT"),
                ("Host", "examplebucket-1250000000.cos.ap-beijing.myqcloud.com"),
                ("x-cos-acl", "private"),
                ("x-cos-grant-read", "uin=\"100000000011\""),
            ],
            1557989151,
            1557996351,
        )?;

        assert!(auth.contains(
            "q-header-list=content-length;content-md5;content-type;date;host;x-cos-acl;x-cos-grant-read&"
        ));
        assert!(auth.ends_with("q-signature=d72ee925da29ab8e8db16fd9a1f567e1ba281e6a"));
        Ok(())
    }

    #[test]
    fn test_authorization_sorts_params()-> Result<(), UploadError> {
        let auth = authorization(
            &credentials(),
            "get",
            "/",
            &[("prefix", "images/"), ("max-keys", "10"), ("Delimiter", "/")],
            &[("host", "examplebucket-1250000000.cos.ap-beijing.myqcloud.com")],
            1557989151,
            1557996351,
        )?;
        assert!(auth.contains("q-url-param-list=delimiter;max-keys;prefix&"));
        Ok(())
    }

    #[test]
    fn test_authorization_is_deterministic() -> Result<(), UploadError> {
        let headers = [("host", "examplebucket-1250000000.cos.ap-beijing.myqcloud.com")];
        let a = authorization(&credentials(), "GET", "/a.txt", &[], &headers, 1, 2)?;
        let b = authorization(&credentials(), "GET", "/a.txt", &[], &headers, 1, 2)?;
        let c = authorization(&credentials(), "GET", "/b.txt", &[], &headers, 1, 2)?;
        assert_eq!(a, b);
        assert_ne!(a, c);
        Ok(())
    }

    #[test]
    fn test_sign_request_sets_host_and_authorization() -> Result<(), UploadError> {
        let client = reqwest::Client::new();
        let mut request = client
            .get("http://127.0.0.1:8080/docs/a.txt?versionId=v1")
            .header("x-cos-meta-owner", "alice")
            .header("range", "bytes=0-9")
            .build()
            .map_err(|e| UploadError::from_provider(e, "cos", "build"))?;

        sign_request(&credentials(), &mut request, 600)?;

        assert_eq!(request.headers()[HOST], "127.0.0.1:8080");
        let auth = request.headers()[AUTHORIZATION].to_str().unwrap().to_string();
        assert!(auth.contains("q-header-list=host;x-cos-meta-owner&"));
        assert!(auth.contains("q-url-param-list=versionid&"));
        Ok(())
    }
}
