//! The fixed export purchase-sale contract document.
//!
//! The legal text is deliberately hard-coded. Only the transaction values
//! (parties, product line, prices, delivery) vary per record; the clauses
//! themselves are the company's negotiated boilerplate and changing them is
//! a legal decision, not a data one. Every interpolated value passes through
//! [`escape_html`] first.
//!
//! Chinese glyph coverage is the other concern here: the headless engine
//! renders in a bare environment with no CJK system fonts, so the Noto Sans
//! SC faces are embedded into the page as data-URL `@font-face` rules. When
//! the font files are missing we log and render without them rather than
//! fail the whole pipeline.

use crate::pipeline::normalize::parse_amount;
use crate::pipeline::rmb::rmb_uppercase;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::OnceCell;
use std::fmt::Write as _;
use std::path::Path;
use tracing::warn;

/// Everything the contract template interpolates, already normalized to
/// display text by the caller.
#[derive(Debug, Clone, Default)]
pub struct ContractValues {
    pub contract_no: String,
    pub sign_date: String,
    pub sign_place: String,

    pub supplier_name: String,
    pub supplier_contact: String,
    pub supplier_phone: String,

    pub buyer_name: String,
    pub buyer_contact: String,
    pub buyer_phone: String,

    pub product_name: String,
    pub sku: String,

    pub qty: String,
    pub qty_unit: String,

    pub unit_price: String,
    pub total_price: String,

    pub planned_delivery: String,
    pub product_remark: String,
    pub payment_terms: String,

    pub product_img_data_url: Option<String>,
    pub font_css: Option<String>,
}

/// Escape text for interpolation into HTML body or attribute positions.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

static FONT_CSS: OnceCell<Option<String>> = OnceCell::new();

/// `@font-face` rules with the Noto Sans SC faces inlined as data URLs.
///
/// The files are large (several MB each) so the encoded CSS is built once
/// per process. Returns `None`, with a warning, when either face cannot be
/// read; the template then falls back to whatever fonts the engine has.
pub fn embedded_font_css(fonts_dir: &Path) -> Option<String> {
    FONT_CSS
        .get_or_init(|| {
            let regular = font_data_url(&fonts_dir.join("NotoSansSC-Regular.ttf"))?;
            let bold = font_data_url(&fonts_dir.join("NotoSansSC-Bold.ttf"))?;
            Some(format!(
                r#"@font-face{{
      font-family:"NotoSansSC";
      src:url("{regular}") format("truetype");
      font-weight:400;
      font-style:normal;
      font-display:swap;
    }}
    @font-face{{
      font-family:"NotoSansSC";
      src:url("{bold}") format("truetype");
      font-weight:700;
      font-style:normal;
      font-display:swap;
    }}"#
            ))
        })
        .clone()
}

fn font_data_url(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(format!("data:font/ttf;base64,{}", STANDARD.encode(bytes))),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "font file unavailable, rendering without embedded fonts");
            None
        }
    }
}

/// Render the full contract document for one set of resolved values.
pub fn build_contract_html(p: &ContractValues) -> String {
    let total_num = parse_amount(&serde_json::Value::from(p.total_price.as_str()));
    let total_upper = if total_num != 0.0 && total_num.is_finite() {
        rmb_uppercase(total_num)
    } else {
        String::new()
    };

    let spec = if p.sku.is_empty() {
        "（详见附件技术要求）".to_string()
    } else {
        format!("{}（详见附件技术要求）", p.sku)
    };

    // An absent delivery date must not leave a dangling "：，".
    let planned_delivery_line = if p.planned_delivery.is_empty() {
        "计划交货期：具体以需方通知的出货计划为准".to_string()
    } else {
        format!(
            "计划交货期：{}，具体以需方通知的出货计划为准",
            escape_html(&p.planned_delivery)
        )
    };

    let qty_unit = {
        let trimmed = p.qty_unit.trim();
        if trimmed.is_empty() { "台" } else { trimmed }
    };

    let mut html = String::with_capacity(16 * 1024);

    let _ = write!(
        html,
        r#"<!doctype html>
<html lang="zh-CN">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <style>
    {font_css}

    *{{ box-sizing:border-box; }}
    body{{
      font-family:"NotoSansSC","PingFang SC","Microsoft YaHei",Arial,sans-serif;
      color:#000;
      margin:0;
      padding:24px 26px;
      background:#fff;
      font-size:14px;
      line-height:1.75;
    }}
    .title{{
      text-align:center;
      font-weight:700;
      font-size:22px;
      margin:0 0 10px 0;
      letter-spacing:1px;
    }}
    .meta{{ margin:0 0 10px 0; }}
    .meta div{{ margin:2px 0; }}

    .para{{ margin:6px 0; }}

    table{{
      width:100%;
      border-collapse:collapse;
      margin:10px 0 10px 0;
      table-layout:fixed;
    }}
    th,td{{
      border:2px solid #111;
      padding:10px 10px;
      vertical-align:top;
      word-break:break-word;
    }}
    th{{ text-align:center; font-weight:700; }}

    .section-title{{
      font-weight:700;
      font-size:18px;
      margin:16px 0 8px 0;
    }}

    .imgbox{{
      margin:10px 0 8px 0;
      display:flex;
      gap:12px;
      align-items:flex-start;
    }}
    .imgbox .label{{
      font-weight:700;
      min-width:70px;
    }}
    .imgbox img{{
      max-width:260px;
      max-height:200px;
      object-fit:contain;
      border:1px solid #ddd;
      padding:6px;
    }}

    .sign-row{{
      display:flex;
      justify-content:space-between;
      gap:22px;
      margin-top:18px;
      font-size:14px;
    }}
    .sign-col{{ flex:1; }}
  </style>
</head>
<body>

  <div class="title">出口产品购销合同</div>

  <div class="meta">
    <div>合同编号：{contract_no}</div>
    <div>签订日期：{sign_date}</div>
    <div>签订地点：{sign_place}</div>
  </div>

  <div class="para">根据《中华人民共和国民法典》及相关法律规定，供需双方在平等、自愿、公平、诚实信用基础上，就供方供应需方出口产品事宜协商一致，订立本合同，双方共同遵守。</div>

  <div class="para">
    供方：{supplier_name}<br/>
    法定代表人/授权代表：{supplier_contact}　　电话：{supplier_phone}<br/>
    需方：{buyer_name}<br/>
    法定代表人/授权代表：{buyer_contact}　　电话：{buyer_phone}
  </div>

  <div class="section-title">一、品名、规格、数量、金额、交货期</div>

  <table>
    <thead>
      <tr>
        <th style="width:18%;">品名</th>
        <th style="width:24%;">型号/规格</th>
        <th style="width:12%;">数量（{qty_unit}）</th>
        <th style="width:16%;">出厂含税单价（元/{qty_unit}）</th>
        <th style="width:14%;">金额（元）</th>
      </tr>
    </thead>
    <tbody>
      <tr>
        <td>{product_name}</td>
        <td>{spec}</td>
        <td>{qty}</td>
        <td>{unit_price}</td>
        <td>{total_price}</td>
      </tr>
    </tbody>
  </table>

  <div class="para">合同总价：人民币{total_price}元（大写：{total_upper}），含13%增值税。</div>
  <div class="para">交货地点：供方指定，货物风险与损失责任在双方签收《送货单/交接单》时转移。</div>
  <div class="para">{planned_delivery_line}</div>
  <div class="para">产品备注：{product_remark}</div>
"#,
        font_css = p.font_css.as_deref().unwrap_or(""),
        contract_no = escape_html(&p.contract_no),
        sign_date = escape_html(&p.sign_date),
        sign_place = escape_html(&p.sign_place),
        supplier_name = escape_html(&p.supplier_name),
        supplier_contact = escape_html(&p.supplier_contact),
        supplier_phone = escape_html(&p.supplier_phone),
        buyer_name = escape_html(&p.buyer_name),
        buyer_contact = escape_html(&p.buyer_contact),
        buyer_phone = escape_html(&p.buyer_phone),
        qty_unit = escape_html(qty_unit),
        product_name = escape_html(&p.product_name),
        spec = escape_html(&spec),
        qty = escape_html(&p.qty),
        unit_price = escape_html(&p.unit_price),
        total_price = escape_html(&p.total_price),
        total_upper = escape_html(&total_upper),
        planned_delivery_line = planned_delivery_line,
        product_remark = escape_html(&p.product_remark),
    );

    if let Some(img) = &p.product_img_data_url {
        let _ = write!(
            html,
            r#"
  <div class="imgbox">
    <div class="label">产品图：</div>
    <img src="{img}" alt="产品图" />
  </div>
"#
        );
    }

    html.push_str(
        r#"
  <div class="para">1.1 附件与确认：本合同附件（包括但不限于技术要求、包装要求、封样/确认样品记录、箱唛/贴标文件、AQL检验标准等）构成本合同不可分割部分。供方不得擅自变更材料、结构、工艺、包装或配件；确需变更的，应经需方书面（含盖章扫描件、邮件/企业微信/飞书等可追溯方式）确认后方可执行。</div>
  <div class="para">1.2 分批出货与交接：供方每批出货前应向需方提交《出货清单》（型号/数量/箱数/毛净重/箱规/批次号等）及出货照片，经需方书面确认后方可出货；否则因此造成的错发、漏发、贴标错误等损失由供方承担。</div>

  <div class="section-title">二、质量保证、验货与不良处理</div>
  <div class="para">2.1 质量与合规：供方保证产品符合封样、双方确认的技术/包装要求及适用的出口合规要求。因产品质量、配件缺失、贴标错误或知识产权问题导致外商/平台/消费者索赔的，由供方承担相应经济责任；若责任可归因于需方提供的贴标/唛头文件错误或指示不当的，供方不承担该部分责任。</div>
  <div class="para">2.2 验货：初检在供方工厂进行。需方自行安排出货前检验（按照AQL进行）。如检验结论为不合格（需返工/重工/补料），则由供方承担该次检验及复检相关合理费用。</div>
  <div class="para">2.3 异议与质保：需方/外商/最终客户在收货后12个月内提出非人为质量异议的，需方应在发现问题后30日内向供方提交证据（照片/视频/平台报告/第三方报告等）。供方应在收到证据后5个工作日内提出处理方案并执行。</div>
  <div class="para">2.4 不良品处理（折中标准）：<br/>
  （1）功能性次品（如无法安装、孔位错、承重不达标等）：次品率≤2%时，供方免费补寄配件或随下次货柜发往美国售后仓；次品率＞2%时，超出部分按对应问题部件/整机货值（以本合同含税单价折算）赔偿，并承担美国境内合理退换运费（需方提供凭证）。<br/>
  （2）外观/包装次品（如漆面划伤、污渍、泡棉破损、外箱破损、贴标错误、配件包装错漏等）：次品率≤3%时，供方免费补寄对应配件/外箱/贴标或按需方要求折价处理；次品率＞3%时，超出部分按整机货值（以本合同含税单价折算）赔偿，并承担因此产生的合理返工及复检费用（需方提供凭证）。<br/>
  （3）返工与复原：所有返工、抽检后的产品，打包带须复原、塑料袋无破损、无脏污、无胶印；不符合者视为不合格品并按本条处理。</div>
  <div class="para">2.5 售后备件：供方应按需方要求提供易损件备件（如脚垫、螺丝包、泡棉等），具体数量与随货方式以附件或需方书面通知为准。</div>

  <div class="section-title">三、交货、结算与票据</div>
  <div class="para">3.1 交货期：供方应按需方书面分批计划出货。供方不得以内部物料准备、打样、模具等原因单方延迟。</div>
"#,
    );

    let _ = write!(
        html,
        r#"  <div class="para">3.2 付款条件：{payment_terms}</div>
  <div class="para">3.3 发票与单据：供方须于发货后10个工作日内开具合法有效的13%增值税专用发票。增值税发票/送货单/合同信息必须一致（品名、型号、数量、双方抬头等）。</div>
  <div class="para">3.4 生产过程信息：供方提供生产过程关键节点照片/视频，便于需方抽查确认。</div>
"#,
        payment_terms = escape_html(&p.payment_terms),
    );

    let _ = write!(
        html,
        r#"
  <div class="section-title">四、双方责任与违约处理</div>
  <div class="para">4.1 供方责任：按时、按质、按量交货；承担因质量问题、配件缺失、贴标错误等引起的直接损失及可预见的合理间接损失（以需方提供凭证为准）。</div>
  <div class="para">4.2 需方责任：按约支付货款；及时提供包装唛头、贴标文件等资料；提供准确的入仓/集货地址及收货信息。</div>
  <div class="para">4.3 解除与退款：因供方严重违约（包括但不限于延迟超过10日且未达成书面延期协议、擅自量产未确认样品、重大质量不合格）导致解除合同的，供方应在解除通知送达后5个工作日内退还需方已支付款项；若供方已发生合格产品且需方同意接收的，双方可另行结算。</div>

  <div class="section-title">五、不可抗力与争议解决</div>
  <div class="para">5.1 不可抗力：因地震、洪水、火灾、战争、政府行为、重大传染病等不可抗力导致不能或暂时不能履约的，受影响方应在事件发生后5日内书面通知对方，并在合理期限内提供官方证明。双方可协商延期履行或部分/全部免除责任。</div>
  <div class="para">5.2 争议解决：本合同适用中华人民共和国法律。因本合同产生的争议，双方应先友好协商；协商不成，任一方可向合同签订地（杭州市临安区）有管辖权的人民法院提起诉讼。</div>

  <div class="section-title">六、其他</div>
  <div class="para">6.1 本合同及附件一式两份，供需双方各执一份，具有同等法律效力。</div>
  <div class="para">6.2 对本合同的任何修改、补充、确认样品、技术变更、交期调整等，均须双方书面（含盖章扫描件、双方确认的邮件/企业微信/飞书等可追溯方式）确认后方为有效。</div>
  <div class="para">6.3 未尽事宜，按国家法律法规及行业惯例执行，或由双方另行签署补充协议。</div>
  <div class="para">6.4 知识产权与合规：供方保证其生产过程、材料、工艺及交付物不侵犯任何第三方知识产权，并符合出口目的国及平台合理合规要求。如发生第三方权利主张或合规追责，由供方负责处理并承担由此给需方造成的损失（含平台扣款、下架损失、合理律师费/和解费等，以凭证为准）。</div>
  <div class="para">6.5 保密：双方对在合作中获知的对方商业信息、产品设计资料、价格条款、客户信息等负有保密义务，未经对方书面同意不得向第三方披露；法律法规或监管要求披露的除外。</div>
  <div class="para">6.6 专用模具/工装：如需方支付或参与支付模具/工装费用，相关模具/工装及其成果权益归需方所有。供方应妥善保管，不得用于为第三方生产相同或近似产品；合作终止时，需方有权要求供方返还或按需方指示处置。</div>
  <div class="para">6.7 分包限制：供方不得未经需方书面同意将本合同产品的关键工序或整机生产分包/转包给第三方。</div>

  <div class="para">（以下无正文）</div>

  <div class="sign-row">
    <div class="sign-col">
      供方（盖章）：{supplier_name}<br/>
      授权代表：__________　　日期：____年__月__日
    </div>
    <div class="sign-col">
      需方（盖章）：{buyer_name}<br/>
      授权代表：__________　　日期：____年__月__日
    </div>
  </div>

</body>
</html>"#,
        supplier_name = escape_html(&p.supplier_name),
        buyer_name = escape_html(&p.buyer_name),
    );

    html
}
