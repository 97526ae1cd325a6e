/*!

This is the long-form manual for `scorecard_core` and the `scorecard` program.

## Input

Any worksheet or CSV file with one row per provider. The header does not need
to be on the first row: exports often carry a title and a date above it. The
row with a cell matching the header keyword (`Colaborador` by default) is the
header, everything above it is ignored. A cell equal to the keyword is the
best match, then a cell containing it as a whole word (`Nombre del
colaborador`), then a cell containing it anywhere (`Colaboradores`). This
keeps a title such as `Dashboard de colaboradores` from being read as the
header when the real header sits below it. If no row contains the keyword,
the first row is the header. When the title repeats the exact keyword, set
`headerKeyword` to another column name of the header.

Column names are compared after normalization: case, accents, punctuation and
repeated spaces do not matter (`"PUNTUACIÓN  SLA"` is `puntuacion sla`).

## Columns

| Field | Accepted names, in priority order |
|-------|-----------------------------------|
| `Provider` | nombre colaborador, colaborador, nombre proveedor, proveedor, provider, empresa |
| `Province` | provincia, province, zona |
| `Guild` | gremio, guild, especialidad, oficio |
| `Price` | puntuacion coste, puntuacion precio, coste, precio, price |
| `Speed` | puntuacion velocidad, tiempo total, puntuacion sla, velocidad, speed |
| `Quality` | puntuacion calidad, calidad, quality |
| `Documentation` | puntuacion documentacion, documentacion, documentation |
| `FinalScore` | nota final, puntuacion final, nota media, final score |

A column matches when its normalized name equals one of the names. When none
matches exactly, a column whose name contains one of them as whole words is
accepted (`"Precio medio (€)"` for `precio`). Exact matches are settled for
every field before any partial one, a column is never used for two fields,
and among partial matches a column that starts with the name, then one with
fewer extra words, is preferred. With `Calidad precio` and `Precio medio`,
Quality gets the first and Price the second.

All the fields are required by default. When some are missing, the error lists
every one of them together with the columns found in the file. The
configuration file may declare other names or make a field optional (except
`Provider`).

Rows without a provider are dropped. Numbers may use a decimal comma and a
trailing `%` or `€`. When both `.` and `,` appear, the last one is the
decimal separator (`1.234,5`, `1,234.5`). A separator that repeats is a
thousands separator (`1.234.567`). A single separator followed by exactly
three digits is read as a thousands separator too, as Spanish exports write
them: `1.500` is 1500 and `1.250 €` is 1250, while `8,5` and `0,125` are
decimals. A cell that cannot be read as a number, or whose groups are
malformed (`1.23.4`), is treated as missing.

## Scoring

The composite score is the weighted sum of the configured fields, for example
`{"Speed": 0.7, "Price": 0.3}`. A record missing one of the weighted fields is
not scored and does not appear in rankings, but it stays in the table.

By default lower composite scores are better (`"direction": "ascending"`),
since the weighted fields are usually costs and delays. Rankings on the final
score use the opposite direction.

## Configuration file

```json
{
  "outputSettings": { "reportName": "Colaboradores 2025", "outputFile": "stdout",
                      "exportFile": "filtrado.csv" },
  "fileSource": { "provider": "excel", "filePath": "proveedores.xlsx",
                  "excelWorksheetName": "Hoja1", "headerKeyword": "Colaborador" },
  "columns": [ { "field": "Speed", "aliases": ["plazo medio"], "required": true } ],
  "scoring": { "weights": { "Speed": 0.7, "Price": 0.3 }, "direction": "ascending",
               "topN": 5, "groupBy": ["Province"] },
  "filter": { "provinces": ["Madrid", "Sevilla"], "price": [0, 50] }
}
```

Paths are relative to the directory of the configuration file. Every entry
is optional. `rankMetric` is `composite` or the name of a numeric field; it
defaults to the composite when weights are given and to `FinalScore`
otherwise.

When a workbook has several worksheets and none is named, the worksheet that
contains the header keyword is used. Command line flags override the file.

*/
