//! COS 基础操作示例
//!
//! 演示 Uploader trait 的基础操作：put/get/list/count/tree/move/delete_all
//!
//! 运行前设置 `TENCENTCLOUD_SECRET_ID` 和 `TENCENTCLOUD_SECRET_KEY`。

use anyhow::Result;
use rustx_cos::upload::{
    CosUploader, CosUploaderConfig, ExistsOptions, GetOptions, ListOptions, PutOptions,
    TreeOptions, Uploader,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config: CosUploaderConfig = json5::from_str(
        r#"
    {
        bucket: "examplebucket-1250000000",
        region: "ap-guangzhou",
        logger: { level: "info" },
    }
    "#,
    )?;

    let uploader = CosUploader::new(config)?;

    // 上传对象
    uploader
        .put_string("demo/basic/hello.txt", "Hello, COS!", PutOptions::default())
        .await?;

    // 获取对象
    let data = uploader
        .get("demo/basic/hello.txt", GetOptions::default())
        .await?;
    println!("content: {}", String::from_utf8_lossy(&data));

    // 分页列举
    let mut cursor = String::new();
    loop {
        let page = uploader
            .list(
                "demo/",
                ListOptions {
                    cursor,
                    limit: 100,
                    ..Default::default()
                },
            )
            .await;
        for object in &page.objects {
            println!("{:?} {} {:?}", object.file_type, object.path, object.size);
        }
        match page.next_cursor {
            Some(next) => cursor = next,
            None => break,
        }
    }

    println!("files under demo/basic/: {}", uploader.count("demo/basic/", true).await);

    // 目录树
    let tree = uploader
        .tree(
            "demo/",
            TreeOptions {
                max_depth: 2,
                count_children: true,
                ..Default::default()
            },
        )
        .await;
    println!("{}", serde_json::to_string_pretty(&tree)?);

    // 移动
    uploader
        .move_object("demo/moved/hello.txt", "demo/basic/hello.txt")
        .await?;
    let exists = uploader
        .exists("demo/basic/hello.txt", ExistsOptions::default())
        .await?;
    println!("source exists after move: {}", exists);

    // 清理
    let report = uploader.delete_all("demo/").await;
    println!("deleted: {}, failed: {}", report.deleted, report.failed.len());

    Ok(())
}
