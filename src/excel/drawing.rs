//! DrawingML readers: chart anchors in `xl/drawings/drawingN.xml` and the
//! chart definitions in `xl/charts/chartN.xml`.
//!
//! Anchor kinds:
//! - `twoCellAnchor`: from/to cell corners, extent usually absent
//! - `oneCellAnchor`: from corner plus `ext`
//! - `absoluteAnchor`: `pos` plus `ext`, recorded as a one-cell anchor at A1

use crate::error::{MicroDbError, MicroDbResult};
use crate::excel::geometry::{resolve_one_anchor_extent, resolve_two_anchor_extent, Extent};
use crate::excel::xml_helpers::{attr_i64, attr_string_local, attr_val, local_name_str};
use crate::types::{
    AnchorPoint, ChartGrouping, ChartKind, ChartLegend, ChartPosition, ChartRecord, ChartSeries,
    ChartSize, ChartText, LegendPosition,
};
use quick_xml::events::Event;
use quick_xml::Reader;

/// A chart frame found in a drawing part.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingAnchor {
    pub position: ChartPosition,
    /// The anchor's own `ext` element, when present
    pub extent: Option<Extent>,
    /// Relationship id of the chart part
    pub chart_rid: String,
}

impl DrawingAnchor {
    pub fn resolve_size(&self) -> ChartSize {
        match &self.position {
            ChartPosition::TwoCell { from, to } => resolve_two_anchor_extent(from, to, self.extent),
            ChartPosition::OneCell { .. } => resolve_one_anchor_extent(None, self.extent),
        }
    }
}

#[derive(Debug, Default)]
struct AnchorBuilder {
    kind: String,
    level: usize,
    from: AnchorPoint,
    to: AnchorPoint,
    pos: Option<(i64, i64)>,
    extent: Option<Extent>,
    chart_rid: Option<String>,
}

impl AnchorBuilder {
    fn build(self) -> Option<DrawingAnchor> {
        let chart_rid = self.chart_rid?;
        let position = match self.kind.as_str() {
            "twoCellAnchor" => ChartPosition::TwoCell {
                from: self.from,
                to: self.to,
            },
            "oneCellAnchor" => ChartPosition::OneCell { from: self.from },
            _ => {
                let (x, y) = self.pos.unwrap_or((0, 0));
                ChartPosition::OneCell {
                    from: AnchorPoint {
                        col: 0,
                        row: 0,
                        col_offset: x,
                        row_offset: y,
                    },
                }
            }
        };
        Some(DrawingAnchor {
            position,
            extent: self.extent,
            chart_rid,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Corner {
    From,
    To,
}

/// Collect the chart anchors of a drawing part. Pictures and shapes are
/// ignored.
pub fn parse_drawing_part(xml: &str) -> Result<Vec<DrawingAnchor>, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut anchors = Vec::new();
    let mut depth: usize = 0;
    let mut current: Option<AnchorBuilder> = None;
    let mut corner: Option<Corner> = None;
    let mut field: Option<String> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| format!("XML error at {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                let level = depth + 1;
                let name = local_name_str(e);

                match name.as_str() {
                    "twoCellAnchor" | "oneCellAnchor" | "absoluteAnchor" if is_start => {
                        current = Some(AnchorBuilder {
                            kind: name.clone(),
                            level,
                            ..Default::default()
                        });
                    }
                    "from" if is_start => corner = Some(Corner::From),
                    "to" if is_start => corner = Some(Corner::To),
                    "col" | "colOff" | "row" | "rowOff" if corner.is_some() => {
                        field = Some(name.clone());
                    }
                    "ext" | "pos" => {
                        if let Some(anchor) = current.as_mut() {
                            // Only direct children of the anchor; nested `a:ext`
                            // elements belong to shape transforms.
                            if level == anchor.level + 1 {
                                if name == "ext" {
                                    let cx = attr_i64(e, b"cx").unwrap_or(0);
                                    let cy = attr_i64(e, b"cy").unwrap_or(0);
                                    anchor.extent = Some(Extent::new(cx, cy));
                                } else {
                                    let x = attr_i64(e, b"x").unwrap_or(0);
                                    let y = attr_i64(e, b"y").unwrap_or(0);
                                    anchor.pos = Some((x, y));
                                }
                            }
                        }
                    }
                    "chart" => {
                        if let Some(anchor) = current.as_mut() {
                            anchor.chart_rid = attr_string_local(e, b"id");
                        }
                    }
                    _ => {}
                }

                if is_start {
                    depth += 1;
                }
            }
            Event::Text(ref t) => {
                if let (Some(anchor), Some(corner), Some(field)) = (current.as_mut(), corner, field.as_deref()) {
                    let text = t.unescape().map_err(|e| e.to_string())?;
                    let point = match corner {
                        Corner::From => &mut anchor.from,
                        Corner::To => &mut anchor.to,
                    };
                    match field {
                        "col" => point.col = text.trim().parse().unwrap_or(0),
                        "row" => point.row = text.trim().parse().unwrap_or(0),
                        "colOff" => point.col_offset = text.trim().parse().unwrap_or(0),
                        "rowOff" => point.row_offset = text.trim().parse().unwrap_or(0),
                        _ => {}
                    }
                }
            }
            Event::End(ref e) => {
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    b"twoCellAnchor" | b"oneCellAnchor" | b"absoluteAnchor" => {
                        if let Some(anchor) = current.take().and_then(AnchorBuilder::build) {
                            anchors.push(anchor);
                        }
                    }
                    b"from" | b"to" => corner = None,
                    b"col" | b"colOff" | b"row" | b"rowOff" => field = None,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(anchors)
}

/// Chart-type element names and the kind they map to
fn chart_kind_for(element: &str) -> Option<ChartKind> {
    let kind = match element {
        "barChart" | "bar3DChart" => ChartKind::Column,
        "lineChart" | "line3DChart" => ChartKind::Line,
        "pieChart" | "ofPieChart" => ChartKind::Pie,
        "pie3DChart" => ChartKind::Pie3D,
        "doughnutChart" => ChartKind::Doughnut,
        "areaChart" | "area3DChart" => ChartKind::Area,
        "scatterChart" => ChartKind::Scatter,
        "radarChart" => ChartKind::Radar,
        "bubbleChart" => ChartKind::Bubble,
        "stockChart" => ChartKind::Stock,
        "surfaceChart" | "surface3DChart" => ChartKind::Surface,
        _ => return None,
    };
    Some(kind)
}

/// Parse a chart part into a [`ChartRecord`] without position or size.
///
/// Series references are kept as raw formula strings. The title is the
/// first rich-text run, else its cell reference.
pub fn parse_chart_part(xml: &str) -> MicroDbResult<ChartRecord> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut stack: Vec<String> = Vec::new();
    let mut kind: Option<ChartKind> = None;
    let mut bar_direction: Option<String> = None;
    let mut grouping: Option<ChartGrouping> = None;
    let mut series: Vec<ChartSeries> = Vec::new();
    let mut current_series: Option<ChartSeries> = None;
    let mut title_run: Option<String> = None;
    let mut title_ref: Option<String> = None;
    let mut legend: Option<ChartLegend> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            MicroDbError::ChartTranslation(format!("Failed to parse chart XML: {e}"))
        })?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                let name = local_name_str(e);
                let parent = stack.last().map(String::as_str);

                if let Some(found) = chart_kind_for(&name) {
                    if kind.is_none() {
                        kind = Some(found);
                    }
                }

                match name.as_str() {
                    "barDir" if bar_direction.is_none() => bar_direction = attr_val(e),
                    "grouping" if grouping.is_none() && parent.is_some_and(|p| chart_kind_for(p).is_some()) => {
                        grouping = attr_val(e).as_deref().and_then(ChartGrouping::parse);
                    }
                    "ser" if is_start => current_series = Some(ChartSeries::default()),
                    "legend" if parent == Some("chart") => {
                        legend = Some(ChartLegend::default());
                    }
                    "legendPos" if parent == Some("legend") => {
                        if let Some(legend) = legend.as_mut() {
                            legend.position = attr_val(e).as_deref().and_then(LegendPosition::parse);
                        }
                    }
                    _ => {}
                }

                if is_start {
                    stack.push(name);
                }
            }
            Event::Text(ref t) => {
                let text = t
                    .unescape()
                    .map_err(|e| MicroDbError::ChartTranslation(format!("Bad chart text: {e}")))?
                    .into_owned();
                let Some(top) = stack.last().map(String::as_str) else {
                    buf.clear();
                    continue;
                };

                if let Some(ser_pos) = stack.iter().rposition(|s| s == "ser") {
                    if let Some(ser) = current_series.as_mut() {
                        let role = stack.get(ser_pos + 1).map(String::as_str);
                        match (role, top) {
                            (Some("tx"), "f") => ser.name = Some(ChartText::Reference(text)),
                            (Some("tx"), "v") if stack.len() == ser_pos + 3 => {
                                ser.name = Some(ChartText::Literal(text))
                            }
                            (Some("cat" | "xVal"), "f") => ser.categories = Some(text),
                            (Some("val" | "yVal"), "f") => ser.values = Some(text),
                            _ => {}
                        }
                    }
                } else if let Some(title_pos) = stack.iter().position(|s| s == "title") {
                    let chart_level = title_pos > 0 && stack[title_pos - 1] == "chart";
                    if chart_level {
                        if top == "t" && title_run.is_none() && stack.iter().any(|s| s == "rich") {
                            title_run = Some(text);
                        } else if top == "f" && title_ref.is_none() {
                            title_ref = Some(text);
                        }
                    }
                }
            }
            Event::End(_) => {
                if let Some(name) = stack.pop() {
                    if name == "ser" {
                        if let Some(ser) = current_series.take() {
                            series.push(ser);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let mut kind = kind.ok_or_else(|| {
        MicroDbError::ChartTranslation("Chart part has no recognized plot type".to_string())
    })?;
    if kind == ChartKind::Column && bar_direction.as_deref() == Some("bar") {
        kind = ChartKind::Bar;
    }

    let mut chart = ChartRecord::new(kind);
    chart.grouping = grouping;
    chart.series = series;
    chart.title = title_run
        .map(ChartText::Literal)
        .or_else(|| title_ref.map(ChartText::Reference));
    chart.legend = legend;
    Ok(chart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TWO_CELL: &str = r#"<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart">
  <xdr:twoCellAnchor editAs="oneCell">
    <xdr:from><xdr:col>4</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>1</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>
    <xdr:to><xdr:col>11</xdr:col><xdr:colOff>304800</xdr:colOff><xdr:row>16</xdr:row><xdr:rowOff>76200</xdr:rowOff></xdr:to>
    <xdr:graphicFrame macro="">
      <xdr:nvGraphicFramePr><xdr:cNvPr id="2" name="Chart 1"/><xdr:cNvGraphicFramePr/></xdr:nvGraphicFramePr>
      <xdr:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/></xdr:xfrm>
      <a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/chart"><c:chart r:id="rId1"/></a:graphicData></a:graphic>
    </xdr:graphicFrame>
    <xdr:clientData/>
  </xdr:twoCellAnchor>
  <xdr:oneCellAnchor>
    <xdr:from><xdr:col>0</xdr:col><xdr:colOff>9525</xdr:colOff><xdr:row>20</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>
    <xdr:ext cx="4572000" cy="2743200"/>
    <xdr:graphicFrame macro=""><a:graphic><a:graphicData><c:chart r:id="rId2"/></a:graphicData></a:graphic></xdr:graphicFrame>
    <xdr:clientData/>
  </xdr:oneCellAnchor>
  <xdr:twoCellAnchor>
    <xdr:from><xdr:col>0</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>0</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>
    <xdr:to><xdr:col>2</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>2</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:to>
    <xdr:pic><xdr:blipFill/></xdr:pic>
    <xdr:clientData/>
  </xdr:twoCellAnchor>
</xdr:wsDr>"#;

    #[test]
    fn test_parse_drawing_anchors() {
        let anchors = parse_drawing_part(TWO_CELL).unwrap();
        assert_eq!(anchors.len(), 2, "picture anchors are ignored");

        let two = &anchors[0];
        assert_eq!(two.chart_rid, "rId1");
        assert_eq!(two.extent, None, "xfrm ext is not the anchor extent");
        match two.position {
            ChartPosition::TwoCell { from, to } => {
                assert_eq!((from.col, from.row), (4, 1));
                assert_eq!((to.col, to.row, to.col_offset, to.row_offset), (11, 16, 304_800, 76_200));
            }
            other => panic!("unexpected position {other:?}"),
        }
        let size = two.resolve_size();
        assert!(size.estimated);
        assert_eq!(size.width, 7 * 640_000 + 304_800);

        let one = &anchors[1];
        assert_eq!(one.chart_rid, "rId2");
        assert_eq!(one.extent, Some(Extent::new(4_572_000, 2_743_200)));
        let size = one.resolve_size();
        assert!(!size.estimated);
        assert_eq!(size.width, 4_572_000);
    }

    const BAR_CHART: &str = r#"<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
  <c:chart>
    <c:title><c:tx><c:rich><a:bodyPr/><a:p><a:r><a:t>Quarterly Sales</a:t></a:r><a:r><a:t> (USD)</a:t></a:r></a:p></c:rich></c:tx><c:overlay val="0"/></c:title>
    <c:plotArea>
      <c:barChart>
        <c:barDir val="bar"/>
        <c:grouping val="stacked"/>
        <c:ser>
          <c:idx val="0"/><c:order val="0"/>
          <c:tx><c:strRef><c:f>Sheet1!$B$1</c:f><c:strCache><c:pt idx="0"><c:v>Revenue</c:v></c:pt></c:strCache></c:strRef></c:tx>
          <c:cat><c:strRef><c:f>Sheet1!$A$2:$A$5</c:f><c:strCache><c:pt idx="0"><c:v>Q1</c:v></c:pt></c:strCache></c:strRef></c:cat>
          <c:val><c:numRef><c:f>Sheet1!$B$2:$B$5</c:f></c:numRef></c:val>
        </c:ser>
        <c:ser>
          <c:idx val="1"/><c:order val="1"/>
          <c:tx><c:v>Costs</c:v></c:tx>
          <c:val><c:numRef><c:f>Sheet1!$C$2:$C$5</c:f></c:numRef></c:val>
        </c:ser>
      </c:barChart>
      <c:valAx><c:title><c:tx><c:rich><a:p><a:r><a:t>Axis</a:t></a:r></a:p></c:rich></c:tx></c:title></c:valAx>
    </c:plotArea>
    <c:legend><c:legendPos val="b"/></c:legend>
  </c:chart>
</c:chartSpace>"#;

    #[test]
    fn test_parse_bar_chart() {
        let chart = parse_chart_part(BAR_CHART).unwrap();
        assert_eq!(chart.kind, ChartKind::Bar);
        assert_eq!(chart.grouping, Some(ChartGrouping::Stacked));
        assert_eq!(chart.title, Some(ChartText::Literal("Quarterly Sales".to_string())));
        assert_eq!(
            chart.legend,
            Some(ChartLegend {
                position: Some(LegendPosition::Bottom)
            })
        );
        assert_eq!(
            chart.series,
            vec![
                ChartSeries {
                    values: Some("Sheet1!$B$2:$B$5".to_string()),
                    categories: Some("Sheet1!$A$2:$A$5".to_string()),
                    name: Some(ChartText::Reference("Sheet1!$B$1".to_string())),
                },
                ChartSeries {
                    values: Some("Sheet1!$C$2:$C$5".to_string()),
                    categories: None,
                    name: Some(ChartText::Literal("Costs".to_string())),
                },
            ]
        );
    }

    #[test]
    fn test_title_reference_and_no_legend() {
        let xml = r#"<c:chartSpace xmlns:c="c"><c:chart>
            <c:title><c:tx><c:strRef><c:f>'My Data'!$A$1</c:f></c:strRef></c:tx></c:title>
            <c:plotArea><c:lineChart><c:grouping val="standard"/>
              <c:ser><c:val><c:numRef><c:f>'My Data'!$B$2:$B$9</c:f></c:numRef></c:val></c:ser>
            </c:lineChart></c:plotArea></c:chart></c:chartSpace>"#;
        let chart = parse_chart_part(xml).unwrap();
        assert_eq!(chart.kind, ChartKind::Line);
        assert_eq!(chart.title, Some(ChartText::Reference("'My Data'!$A$1".to_string())));
        assert_eq!(chart.legend, None);
        assert_eq!(chart.series.len(), 1);
    }

    #[test]
    fn test_unknown_plot_type_is_chart_error() {
        let xml = r#"<c:chartSpace xmlns:c="c"><c:chart><c:plotArea/></c:chart></c:chartSpace>"#;
        let err = parse_chart_part(xml).unwrap_err();
        assert!(matches!(err, MicroDbError::ChartTranslation(_)));
    }
}
