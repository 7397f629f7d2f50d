//! CosUploader 的集成测试：内存客户端覆盖行为语义，mockito 覆盖完整的 HTTP 链路

use anyhow::Result;
use mockito::Matcher;
use rustx_cos::log::{LogLevel, Logger};
use rustx_cos::upload::{
    CosUploader, CosUploaderConfig, DeleteOptions, ExistsOptions, FileType, GetOptions,
    ListOptions, MemoryCosClient, PutOptions, TreeOptions, Uploader,
};
use std::sync::Arc;

const BUCKET: &str = "examplebucket-1250000000";

fn memory_uploader(keys: &[&str]) -> CosUploader<MemoryCosClient> {
    let client = MemoryCosClient::new(BUCKET, "ap-guangzhou");
    for key in keys {
        client.insert(*key, key.as_bytes().to_vec());
    }
    CosUploader::with_client(
        BUCKET,
        "ap-guangzhou",
        client,
        Arc::new(Logger::console(LogLevel::Error)),
    )
}

#[tokio::test]
async fn test_count_files_not_more_than_all() {
    let uploader = memory_uploader(&[
        "images/a.jpg",
        "images/b.jpg",
        "images/c.jpg",
        "images/2023/x.jpg",
        "images/2024/y.jpg",
    ]);

    let files = uploader.count("images/", true).await;
    let all = uploader.count("images/", false).await;
    assert_eq!(files, 3);
    assert_eq!(all, 5);
    assert!(files <= all);
}

#[tokio::test]
async fn test_list_pages_cover_everything_once() {
    let keys = [
        "a.txt", "b.txt", "c/1", "c/2", "d.txt", "e/f/g", "h.txt", "i/", "j.txt",
    ];
    let uploader = memory_uploader(&keys);

    let full = uploader.list("", ListOptions::default()).await;
    let expected: Vec<String> = full.objects.iter().map(|o| o.path.clone()).collect();
    assert_eq!(
        expected,
        vec!["a.txt", "b.txt", "c/", "d.txt", "e/", "h.txt", "i/", "j.txt"]
    );

    let mut seen = Vec::new();
    let mut cursor = String::new();
    loop {
        let page = uploader
            .list(
                "",
                ListOptions {
                    cursor,
                    limit: 3,
                    ..Default::default()
                },
            )
            .await;
        assert!(page.objects.len() <= 3);
        assert!(!page.interrupted);
        seen.extend(page.objects.into_iter().map(|o| o.path));
        match page.next_cursor {
            Some(next) => cursor = next,
            None => break,
        }
    }

    assert_eq!(seen, expected);
}

/// 按游标翻页直到结束，返回所有条目和每页给出的游标
async fn list_all(
    uploader: &CosUploader<MemoryCosClient>,
    options: ListOptions,
) -> (Vec<String>, Vec<String>) {
    let mut seen = Vec::new();
    let mut cursors = Vec::new();
    let mut cursor = String::new();
    loop {
        let page = uploader
            .list(
                "",
                ListOptions {
                    cursor,
                    ..options.clone()
                },
            )
            .await;
        assert!(!page.interrupted);
        if options.limit > 0 {
            assert!(page.objects.len() <= options.limit);
        }
        seen.extend(page.objects.into_iter().map(|o| o.path));
        match page.next_cursor {
            Some(next) => {
                cursors.push(next.clone());
                cursor = next;
            }
            None => break,
        }
    }
    (seen, cursors)
}

#[tokio::test]
async fn test_list_resume_mid_page_on_common_prefix() {
    let uploader = memory_uploader(&[
        "a.txt", "b/1", "c/1", "c/2", "d.txt", "e/1", "f/1", "g.txt", "h/1",
    ]);

    let (seen, cursors) = list_all(
        &uploader,
        ListOptions {
            limit: 2,
            exclude_files: true,
            ..Default::default()
        },
    )
    .await;

    assert_eq!(seen, vec!["b/", "c/", "e/", "f/", "h/"]);
    assert_eq!(cursors, vec!["c/", "f/"]);
}

#[tokio::test]
async fn test_list_resume_beyond_one_service_page() {
    let mut keys: Vec<String> = (0..1199).map(|i| format!("f{:04}", i)).collect();
    keys.push("g/1".to_string());
    keys.extend((0..300).map(|i| format!("h{:04}", i)));
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    let uploader = memory_uploader(&keys);

    let (seen, cursors) = list_all(
        &uploader,
        ListOptions {
            limit: 1200,
            ..Default::default()
        },
    )
    .await;

    // 第 1200 个条目是公共前缀 g/，落在第二个服务端分页的中间
    assert_eq!(cursors, vec!["g/"]);
    assert_eq!(seen.len(), 1500);
    let unique: std::collections::HashSet<&String> = seen.iter().collect();
    assert_eq!(unique.len(), seen.len());
    assert_eq!(seen[1199], "g/");
    assert_eq!(seen[1200], "h0000");
    assert_eq!(seen.last().map(String::as_str), Some("h0299"));
}

#[tokio::test]
async fn test_list_limit_two_returns_cursor() {
    let uploader = memory_uploader(&["a.txt", "b.txt", "dir/x"]);

    let page = uploader
        .list(
            "",
            ListOptions {
                limit: 2,
                ..Default::default()
            },
        )
        .await;

    assert_eq!(page.objects.len(), 2);
    assert!(page.next_cursor.is_some());
    assert!(page.objects.iter().all(|o| o.file_type == FileType::File));
}

#[tokio::test]
async fn test_tree_respects_max_depth() {
    let uploader = memory_uploader(&["r/a/b/c/d.txt", "r/a/x.txt", "r/y.txt"]);

    for max_depth in 0..3 {
        let tree = uploader
            .tree(
                "r/",
                TreeOptions {
                    max_depth,
                    ..Default::default()
                },
            )
            .await;

        let mut stack: Vec<(usize, &rustx_cos::BucketTreeObject)> =
            tree.iter().map(|node| (0, node)).collect();
        while let Some((depth, node)) = stack.pop() {
            assert!(depth <= max_depth);
            if node.object.file_type == FileType::Dir && depth == max_depth {
                assert!(node.children.is_empty());
            }
            stack.extend(node.children.iter().map(|child| (depth + 1, child)));
        }
    }
}

#[tokio::test]
async fn test_delete_all_then_list_is_empty() {
    let uploader = memory_uploader(&["tmp/a", "tmp/b/c", "tmp/b/d/e", "other/f"]);

    let report = uploader.delete_all("tmp/").await;
    assert!(report.is_complete());
    assert_eq!(report.deleted, 3);

    let page = uploader.list("tmp/", ListOptions::default()).await;
    assert!(page.objects.is_empty());
    assert_eq!(uploader.count("other", false).await, 1);
}

#[tokio::test]
async fn test_move_then_exists() -> Result<()> {
    let uploader = memory_uploader(&["from/a.txt"]);

    uploader.move_object("to/a.txt", "from/a.txt").await?;
    assert!(!uploader.exists("from/a.txt", ExistsOptions::default()).await?);
    assert!(uploader.exists("to/a.txt", ExistsOptions::default()).await?);

    uploader.delete("to/a.txt", DeleteOptions::default()).await?;
    assert!(!uploader.exists("to/a.txt", ExistsOptions::default()).await?);
    Ok(())
}

#[tokio::test]
async fn test_put_get_roundtrip_with_files() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let uploader = memory_uploader(&[]);

    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let source = dir.path().join("payload.bin");
    std::fs::write(&source, &payload)?;

    uploader
        .put_from_file("bin/payload.bin", &source, PutOptions::default())
        .await?;
    assert_eq!(
        &uploader.get("bin/payload.bin", GetOptions::default()).await?[..],
        &payload[..]
    );

    let target = dir.path().join("download/payload.bin");
    uploader
        .get_to_file("bin/payload.bin", &target, GetOptions::default())
        .await?;
    assert_eq!(std::fs::read(&target)?, payload);

    let part = uploader
        .get(
            "bin/payload.bin",
            GetOptions {
                range: Some(256..260),
                version_id: None,
            },
        )
        .await?;
    assert_eq!(&part[..], &[0u8, 1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn test_http_uploader_lists_through_mock_server() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("prefix".into(), "images/".into()),
            Matcher::UrlEncoded("delimiter".into(), "/".into()),
            Matcher::UrlEncoded("max-keys".into(), "1000".into()),
        ]))
        .match_header("authorization", Matcher::Regex("q-sign-algorithm=sha1".into()))
        .with_status(200)
        .with_body(
            r#"<ListBucketResult>
    <Name>examplebucket-1250000000</Name>
    <Prefix>images/</Prefix>
    <IsTruncated>false</IsTruncated>
    <CommonPrefixes><Prefix>images/2024/</Prefix></CommonPrefixes>
    <Contents>
        <Key>images/a.jpg</Key>
        <LastModified>2024-05-01T08:00:00.000Z</LastModified>
        <ETag>"9a0364b9e99bb480dd25e1f0284c8555"</ETag>
        <Size>7</Size>
        <StorageClass>STANDARD</StorageClass>
    </Contents>
</ListBucketResult>"#,
        )
        .expect(2)
        .create_async()
        .await;

    let config = CosUploaderConfig {
        bucket: BUCKET.to_string(),
        secret_id: Some("AKIDexample".to_string()),
        secret_key: Some("secret".to_string()),
        bucket_url: Some(server.url()),
        service_url: Some(server.url()),
        ..Default::default()
    };
    let uploader = CosUploader::new(config)?;

    let page = uploader.list("images/", ListOptions::default()).await;
    assert_eq!(page.objects.len(), 2);
    assert_eq!(page.objects[0].path, "images/2024/");
    assert_eq!(page.objects[1].path, "images/a.jpg");
    assert_eq!(page.objects[1].size, Some(7));
    assert_eq!(page.objects[1].params["etag"], "9a0364b9e99bb480dd25e1f0284c8555");

    assert_eq!(uploader.count("images", false).await, 2);

    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_http_uploader_listing_failure_is_partial() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body("<Error><Code>AccessDenied</Code><Message>Access Denied.</Message></Error>")
        .create_async()
        .await;

    let config = CosUploaderConfig {
        bucket: BUCKET.to_string(),
        secret_id: Some("AKIDexample".to_string()),
        secret_key: Some("secret".to_string()),
        bucket_url: Some(server.url()),
        service_url: Some(server.url()),
        ..Default::default()
    };
    let uploader = CosUploader::new(config)?;

    let page = uploader.list("", ListOptions::default()).await;
    assert!(page.interrupted);
    assert!(page.objects.is_empty());
    assert!(uploader.list_buckets().await.is_empty());
    assert_eq!(uploader.count("", false).await, 0);
    assert!(uploader.tree("", TreeOptions::default()).await.is_empty());

    let report = uploader.delete_all("x/").await;
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].key, "x/");
    Ok(())
}

#[tokio::test]
async fn test_http_put_from_file_streams_with_length() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let payload = "0123456789".repeat(1000);
    let source = dir.path().join("payload.txt");
    std::fs::write(&source, &payload)?;

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/upload/payload.txt")
        .match_query(Matcher::Missing)
        .match_header("content-length", "10000")
        .match_body(payload.as_str())
        .with_status(200)
        .create_async()
        .await;

    let config = CosUploaderConfig {
        bucket: BUCKET.to_string(),
        secret_id: Some("AKIDexample".to_string()),
        secret_key: Some("secret".to_string()),
        bucket_url: Some(server.url()),
        service_url: Some(server.url()),
        ..Default::default()
    };
    let uploader = CosUploader::new(config)?;
    uploader
        .put_from_file("upload/payload.txt", &source, PutOptions::default())
        .await?;

    mock.assert_async().await;
    Ok(())
}
